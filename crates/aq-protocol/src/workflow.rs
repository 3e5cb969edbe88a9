//! Per-query resolution state, handed back to the caller between steps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::location::Location;
use crate::outcome::FailureKind;
use crate::query::ParsedQuery;

/// Which workflow variant produced a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    CurrentReading,
    Forecast,
}

/// Workflow stage. `DisambiguationPending` is the only suspend point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Init,
    LocationExtraction,
    LocationResolution,
    DisambiguationPending,
    DataRetrieval,
    ResponseReady,
    Error,
}

/// One point of a time series returned by a domain agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: String,
    pub value: f64,
}

/// Chart payload attached to a response when the agent returned a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub chart_type: String,
    pub points: Vec<SeriesPoint>,
}

/// Normalized view of a domain agent's (loosely shaped) result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainData {
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_series: Vec<SeriesPoint>,
    /// The row the fields were read from.
    pub raw: Value,
}

impl DomainData {
    /// Read a domain result defensively.
    ///
    /// A single-key object whose value is an object is unwrapped first
    /// (drivers that name the column after the function). The value is the
    /// first non-null of `value_keys`, coerced to f64 and rounded to 2 dp.
    pub fn from_raw(raw: &Value, value_keys: &[&str]) -> Self {
        let row = match raw.as_object() {
            Some(map) if map.len() == 1 => match map.values().next() {
                Some(inner @ Value::Object(_)) => inner,
                _ => raw,
            },
            _ => raw,
        };

        let value = value_keys
            .iter()
            .filter_map(|k| row.get(*k))
            .find(|v| !v.is_null())
            .and_then(coerce_f64)
            .map(|v| (v * 100.0).round() / 100.0);

        let timestamp = row.get("timestamp").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });

        Self {
            value,
            timestamp,
            station_count: row.get("station_count").and_then(coerce_count),
            sensor_count: row.get("sensor_count").and_then(coerce_count),
            time_series: read_series(row.get("pm25_time_series").or_else(|| row.get("time_series"))),
            raw: row.clone(),
        }
    }
}

/// Numbers, numeric strings, and nothing else.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Whole, non-negative numbers only; anything else is treated as missing.
fn coerce_count(value: &Value) -> Option<u64> {
    coerce_f64(value)
        .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
        .map(|n| n as u64)
}

/// Series may arrive as an array or as a JSON-encoded string of one.
fn read_series(value: Option<&Value>) -> Vec<SeriesPoint> {
    let decoded;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|point| {
            let time = point
                .get("target_time")
                .or_else(|| point.get("time"))
                .and_then(Value::as_str)?;
            let value = point
                .get("pm25")
                .or_else(|| point.get("value"))
                .and_then(coerce_f64)
                .unwrap_or(0.0);
            Some(SeriesPoint {
                time: time.to_string(),
                value,
            })
        })
        .collect()
}

/// Everything known about one query's resolution.
///
/// Created fresh per query. When `waiting_for_user` is set the caller keeps
/// the whole state and hands it back with a selection index to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub kind: WorkflowKind,
    #[serde(default)]
    pub stage: WorkflowStage,
    pub user_query: String,
    #[serde(default)]
    pub location_search_term: String,
    /// Candidate locations from the resolver, in resolver order.
    #[serde(default, alias = "candidate_locations")]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub needs_disambiguation: bool,
    #[serde(default)]
    pub selected_location: Option<Location>,
    /// Upstream parse, kept so a resumed state can forward its entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedQuery>,
    /// Forecast horizon in days (forecast variant only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_days: Option<u32>,
    #[serde(default)]
    pub domain_data: Option<DomainData>,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSeries>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default)]
    pub waiting_for_user: bool,
}

impl WorkflowState {
    pub fn new(kind: WorkflowKind, user_query: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            stage: WorkflowStage::Init,
            user_query: user_query.into(),
            location_search_term: String::new(),
            locations: Vec::new(),
            needs_disambiguation: false,
            selected_location: None,
            parsed: None,
            forecast_days: None,
            domain_data: None,
            response: String::new(),
            chart: None,
            error: None,
            error_kind: None,
            waiting_for_user: false,
        }
    }

    /// Terminal once exactly one of response/error is set and not suspended.
    pub fn is_terminal(&self) -> bool {
        !self.waiting_for_user && (self.error.is_some() || !self.response.is_empty())
    }

    pub fn is_suspended(&self) -> bool {
        self.waiting_for_user
    }

    /// Terminate with a user-facing failure message.
    pub fn finish_error(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.response.clear();
        self.chart = None;
        self.waiting_for_user = false;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.stage = WorkflowStage::Error;
    }

    /// Terminate with a rendered reply.
    pub fn finish_response(&mut self, text: impl Into<String>, chart: Option<ChartSeries>) {
        self.error = None;
        self.error_kind = None;
        self.waiting_for_user = false;
        self.response = text.into();
        if self.response.is_empty() {
            self.response = "No data available.".into();
        }
        self.chart = chart;
        self.stage = WorkflowStage::ResponseReady;
    }

    /// Suspend until the caller supplies a candidate index.
    pub fn suspend_for_selection(&mut self) {
        self.needs_disambiguation = true;
        self.selected_location = None;
        self.waiting_for_user = true;
        self.stage = WorkflowStage::DisambiguationPending;
    }

    /// Drop any output from a previous run before resuming.
    pub fn clear_outcome(&mut self) {
        self.response.clear();
        self.chart = None;
        self.error = None;
        self.error_kind = None;
        self.domain_data = None;
    }
}
