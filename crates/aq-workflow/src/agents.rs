//! Collaborator contracts: location resolution and domain data.

use async_trait::async_trait;
use aq_protocol::{AgentOutcome, Entities, Location};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maps a free-text place name to canonical candidate locations.
///
/// `Success` carries candidates in resolver order (possibly empty).
/// `NeedsDisambiguation` is treated the same as `Success`: the workflow
/// applies its own collapse rule to decide whether to ask the user.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self, term: &str) -> AgentOutcome<Vec<Location>>;
}

/// Location search backends that answer with loosely shaped JSON rows
/// (`code`, `level`, `name` or `location_name`, `state_code`, ...).
#[async_trait]
pub trait LocationSearch: Send + Sync {
    async fn search(&self, term: &str) -> AgentOutcome<Vec<Value>>;
}

/// Turns a row-returning `LocationSearch` into a `LocationResolver`.
///
/// Rows are decoded with `Location::from_raw`; rows with neither a name
/// nor a code are skipped.
pub struct RowLocationResolver<S> {
    search: S,
}

impl<S: LocationSearch> RowLocationResolver<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }
}

#[async_trait]
impl<S: LocationSearch> LocationResolver for RowLocationResolver<S> {
    async fn resolve(&self, term: &str) -> AgentOutcome<Vec<Location>> {
        match self.search.search(term).await {
            AgentOutcome::Success { payload } => {
                let total = payload.len();
                let locations: Vec<Location> = payload.iter().filter_map(Location::from_raw).collect();
                if locations.len() < total {
                    tracing::warn!(
                        term,
                        skipped = total - locations.len(),
                        "dropped location rows without name or code"
                    );
                }
                AgentOutcome::success(locations)
            }
            AgentOutcome::NeedsDisambiguation { candidates } => {
                AgentOutcome::NeedsDisambiguation { candidates }
            }
            AgentOutcome::Failure { kind, message } => AgentOutcome::Failure { kind, message },
        }
    }
}

/// Fetches readings (or forecasts) for one resolved location.
///
/// The payload is the agent's raw row; the workflow normalizes it with
/// `DomainData::from_raw`.
#[async_trait]
pub trait DomainAgent: Send + Sync {
    async fn run(&self, request: &DomainRequest) -> AgentOutcome<serde_json::Value>;

    /// Agent name (for logging).
    fn name(&self) -> &str;
}

/// Parameters handed to a domain agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRequest {
    pub location: Location,
    /// The user's original text.
    pub query: String,
    /// Upstream entities worth forwarding (metric, duration, unit, aggregation).
    #[serde(default, skip_serializing_if = "Entities::is_empty")]
    pub entities: Entities,
    /// Forecast horizon in days, forecast requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl DomainRequest {
    pub fn new(location: Location, query: impl Into<String>) -> Self {
        Self {
            location,
            query: query.into(),
            entities: Entities::new(),
            days: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_protocol::FailureKind;
    use serde_json::json;

    struct Rows(AgentOutcome<Vec<Value>>);

    #[async_trait]
    impl LocationSearch for Rows {
        async fn search(&self, _term: &str) -> AgentOutcome<Vec<Value>> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn row_resolver_decodes_aliased_rows() {
        let resolver = RowLocationResolver::new(Rows(AgentOutcome::success(vec![
            json!({"code": "0912", "level": "District", "location_name": "Lucknow", "state_code": "09"}),
            json!({"code": "W-17", "level": "ward"}),
            json!({"level": "city"}),
        ])));

        let AgentOutcome::Success { payload } = resolver.resolve("lucknow").await else {
            panic!("expected success");
        };
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].name, "Lucknow");
        assert_eq!(payload[0].level, "district");
        assert_eq!(payload[0].state_code.as_deref(), Some("09"));
        assert_eq!(payload[1].name, "Location W-17");
    }

    #[tokio::test]
    async fn row_resolver_passes_failures_through() {
        let resolver = RowLocationResolver::new(Rows(AgentOutcome::failure(
            FailureKind::Unavailable,
            "search backend down",
        )));
        assert_eq!(
            resolver.resolve("delhi").await,
            AgentOutcome::failure(FailureKind::Unavailable, "search backend down")
        );
    }

    #[test]
    fn request_omits_empty_optionals() {
        let req = DomainRequest::new(Location::new("0912", "district", "Lucknow"), "pm in lucknow");
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("entities").is_none());
        assert!(json.get("days").is_none());
        assert_eq!(json["location"]["code"], "0912");
    }

    #[test]
    fn request_carries_horizon_and_entities() {
        let mut req = DomainRequest::new(Location::new("0912", "district", "Lucknow"), "forecast");
        req.days = Some(3);
        req.entities.insert("metric".into(), json!("pm25"));
        let back: DomainRequest = serde_json::from_str(&serde_json::to_string(&req).unwrap()).unwrap();
        assert_eq!(back, req);
    }
}
