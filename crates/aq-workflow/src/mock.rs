//! In-memory collaborators for tests: canned locations and readings.

use std::collections::HashMap;

use async_trait::async_trait;
use aq_protocol::{AgentOutcome, FailureKind, Location};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::agents::{DomainAgent, DomainRequest, LocationResolver};

/// Resolves terms from a fixed table (keys are lower-case).
pub struct MockLocationResolver {
    places: HashMap<String, Vec<Location>>,
    failure: Option<(FailureKind, String)>,
    terms: Mutex<Vec<String>>,
}

impl MockLocationResolver {
    pub fn new() -> Self {
        Self {
            places: HashMap::new(),
            failure: None,
            terms: Mutex::new(Vec::new()),
        }
    }

    pub fn with_place(mut self, term: &str, candidates: Vec<Location>) -> Self {
        self.places.insert(term.to_lowercase(), candidates);
        self
    }

    /// Every lookup fails with this outcome.
    pub fn failing(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.failure = Some((kind, message.into()));
        self
    }

    /// A few real-world cases: a unique district, a name shared by two
    /// places at different levels, and a duplicated listing.
    pub fn with_india_sample() -> Self {
        Self::new()
            .with_place(
                "lucknow",
                vec![Location::new("0912", "district", "Lucknow").with_state("09", "Uttar Pradesh")],
            )
            .with_place(
                "aurangabad",
                vec![
                    Location::new("2719", "district", "Aurangabad").with_state("27", "Maharashtra"),
                    Location::new("1025", "city", "Aurangabad")
                        .with_state("10", "Bihar")
                        .with_district("Aurangabad"),
                ],
            )
            .with_place(
                "kanpur",
                vec![
                    Location::new("0926", "district", "Kanpur").with_state("09", "Uttar Pradesh"),
                    Location::new("0926-A", "district", "Kanpur").with_state("09", "Uttar Pradesh"),
                ],
            )
    }

    /// Terms looked up so far, in call order.
    pub async fn terms(&self) -> Vec<String> {
        self.terms.lock().await.clone()
    }
}

impl Default for MockLocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationResolver for MockLocationResolver {
    async fn resolve(&self, term: &str) -> AgentOutcome<Vec<Location>> {
        self.terms.lock().await.push(term.to_string());
        if let Some((kind, message)) = &self.failure {
            return AgentOutcome::failure(*kind, message.clone());
        }
        AgentOutcome::success(
            self.places
                .get(&term.trim().to_lowercase())
                .cloned()
                .unwrap_or_default(),
        )
    }
}

/// Serves canned rows by location code, with an optional fallback row.
pub struct MockDomainAgent {
    name: String,
    rows: HashMap<String, Value>,
    fallback: Option<Value>,
    failure: Option<(FailureKind, String)>,
    requests: Mutex<Vec<DomainRequest>>,
}

impl MockDomainAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: HashMap::new(),
            fallback: None,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_row(mut self, code: &str, row: Value) -> Self {
        self.rows.insert(code.to_string(), row);
        self
    }

    /// Row returned for codes without their own entry.
    pub fn with_fallback(mut self, row: Value) -> Self {
        self.fallback = Some(row);
        self
    }

    pub fn failing(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.failure = Some((kind, message.into()));
        self
    }

    /// Current readings shaped like the database function's row.
    pub fn current_sample() -> Self {
        Self::new("mock-current").with_fallback(json!({
            "pm25_value": 87.456,
            "timestamp": "2025-01-13T14:30:00Z",
            "station_count": 4
        }))
    }

    /// Forecast rows with a (string-encoded) hourly series.
    pub fn forecast_sample() -> Self {
        let series = json!([
            {"target_time": "2025-01-14T01:00:00Z", "pm25": 131.0},
            {"target_time": "2025-01-14T00:00:00Z", "pm25": 128.5},
            {"target_time": "2025-01-14T02:00:00Z", "pm25": 135.2}
        ]);
        Self::new("mock-forecast").with_fallback(json!({
            "get_forecast_pm25_sensor_agg": {
                "predicted_pm25": 132.4,
                "sensor_count": 9,
                "pm25_time_series": series.to_string()
            }
        }))
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<DomainRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl DomainAgent for MockDomainAgent {
    async fn run(&self, request: &DomainRequest) -> AgentOutcome<Value> {
        self.requests.lock().await.push(request.clone());
        if let Some((kind, message)) = &self.failure {
            return AgentOutcome::failure(*kind, message.clone());
        }
        match self.rows.get(&request.location.code).or(self.fallback.as_ref()) {
            Some(row) => AgentOutcome::success(row.clone()),
            None => AgentOutcome::failure(
                FailureKind::DomainData,
                "No PM2.5 data available for this location",
            ),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
