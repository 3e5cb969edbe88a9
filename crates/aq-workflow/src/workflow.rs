//! The resolution state machine.
//!
//! `INIT → LOCATION_EXTRACTION → LOCATION_RESOLUTION → (DISAMBIGUATION_PENDING | DATA_RETRIEVAL)
//! → RESPONSE_READY | ERROR`
//!
//! Failures never surface as Rust errors: they terminate the state with
//! `error` and `error_kind` set. A suspended state is handed back to the
//! caller whole and resumed with [`Workflow::continue_with_selection`].

use std::collections::HashSet;
use std::sync::Arc;

use aq_parser::QueryParser;
use aq_protocol::{
    AgentOutcome, ChartSeries, DomainData, Entities, FailureKind, Location, WorkflowKind,
    WorkflowStage, WorkflowState,
};

use crate::agents::{DomainAgent, DomainRequest, LocationResolver};
use crate::extract::{ExtractionChain, clean};
use crate::format;
use crate::horizon::forecast_days;

/// Upstream entities passed through to the domain agent.
const FORWARDED_ENTITIES: [&str; 4] = ["metric", "duration", "unit", "aggregation"];

/// What differs between the current-reading and forecast workflows.
pub trait WorkflowVariant: Send + Sync {
    const KIND: WorkflowKind;

    fn chain(&self) -> &'static ExtractionChain;

    /// Candidate keys for the headline value, in priority order.
    fn value_keys(&self) -> &'static [&'static str];

    fn extraction_failure(&self) -> &'static str;

    /// Fill variant-specific state before retrieval. Must be idempotent.
    fn prepare(&self, _state: &mut WorkflowState) {}

    fn request(&self, state: &WorkflowState, location: &Location) -> DomainRequest;

    fn render(
        &self,
        state: &WorkflowState,
        location: &Location,
        data: &DomainData,
    ) -> (String, Option<ChartSeries>);

    fn retrieval_failure(&self, location: &Location, detail: &str) -> String;
}

/// Latest PM2.5 reading for a place.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentReading;

impl WorkflowVariant for CurrentReading {
    const KIND: WorkflowKind = WorkflowKind::CurrentReading;

    fn chain(&self) -> &'static ExtractionChain {
        ExtractionChain::current_reading()
    }

    fn value_keys(&self) -> &'static [&'static str] {
        &["pm25_value", "current_pm25", "current_pm25_value", "value", "avg_value"]
    }

    fn extraction_failure(&self) -> &'static str {
        "Could not identify a location in your query. Please specify a location."
    }

    fn request(&self, state: &WorkflowState, location: &Location) -> DomainRequest {
        let mut request = DomainRequest::new(location.clone(), &state.user_query);
        request.entities = forwarded_entities(state);
        request
    }

    fn render(
        &self,
        _state: &WorkflowState,
        location: &Location,
        data: &DomainData,
    ) -> (String, Option<ChartSeries>) {
        format::render_current(location, data)
    }

    fn retrieval_failure(&self, location: &Location, detail: &str) -> String {
        format!("Could not retrieve current PM2.5 data for {}: {detail}", location.name)
    }
}

/// PM2.5 forecast over a 1–7 day horizon.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forecast;

impl WorkflowVariant for Forecast {
    const KIND: WorkflowKind = WorkflowKind::Forecast;

    fn chain(&self) -> &'static ExtractionChain {
        ExtractionChain::forecast()
    }

    fn value_keys(&self) -> &'static [&'static str] {
        &["predicted_pm25", "forecast_pm25", "pm25_forecast", "pm25_value", "current_pm25"]
    }

    fn extraction_failure(&self) -> &'static str {
        "Could not identify a location in your query. Please specify a location for the forecast."
    }

    fn prepare(&self, state: &mut WorkflowState) {
        if state.forecast_days.is_none() {
            state.forecast_days = Some(forecast_days(&state.user_query));
        }
    }

    fn request(&self, state: &WorkflowState, location: &Location) -> DomainRequest {
        let mut request = DomainRequest::new(location.clone(), &state.user_query);
        request.entities = forwarded_entities(state);
        request.days = Some(
            state
                .forecast_days
                .unwrap_or_else(|| forecast_days(&state.user_query)),
        );
        request
    }

    fn render(
        &self,
        state: &WorkflowState,
        location: &Location,
        data: &DomainData,
    ) -> (String, Option<ChartSeries>) {
        format::render_forecast(location, data, state.forecast_days.unwrap_or(1))
    }

    fn retrieval_failure(&self, location: &Location, _detail: &str) -> String {
        format!(
            "Could not retrieve PM2.5 forecast for {}. The forecasting service might be unavailable.",
            location.name
        )
    }
}

fn forwarded_entities(state: &WorkflowState) -> Entities {
    let mut entities = Entities::new();
    if let Some(parsed) = &state.parsed {
        for key in FORWARDED_ENTITIES {
            if let Some(value) = parsed.entities.get(key).filter(|v| !v.is_null()) {
                entities.insert(key.to_string(), value.clone());
            }
        }
    }
    entities
}

/// Whether the user must choose: more than one distinct (name, level) pair.
pub fn needs_disambiguation(candidates: &[Location]) -> bool {
    if candidates.len() < 2 {
        return false;
    }
    let distinct: HashSet<(String, &str)> = candidates
        .iter()
        .map(|c| (c.name.trim().to_lowercase(), c.level.as_str()))
        .collect();
    distinct.len() > 1
}

/// One workflow engine, parameterized by variant.
pub struct Workflow<V> {
    variant: V,
    resolver: Arc<dyn LocationResolver>,
    agent: Arc<dyn DomainAgent>,
    parser: Option<Arc<dyn QueryParser>>,
}

pub type CurrentReadingWorkflow = Workflow<CurrentReading>;
pub type ForecastWorkflow = Workflow<Forecast>;

impl<V: WorkflowVariant> Workflow<V> {
    pub fn new(variant: V, resolver: Arc<dyn LocationResolver>, agent: Arc<dyn DomainAgent>) -> Self {
        Self {
            variant,
            resolver,
            agent,
            parser: None,
        }
    }

    /// Use an upstream parser's `location` entity ahead of the extraction chain.
    pub fn with_parser(mut self, parser: Arc<dyn QueryParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Run a fresh query until it terminates or suspends for a selection.
    pub async fn process_query(&self, query: &str) -> WorkflowState {
        let mut state = WorkflowState::new(V::KIND, query);
        tracing::info!(workflow = %state.id, kind = ?V::KIND, query, "processing query");

        if let Some(parser) = &self.parser {
            let parsed = parser.parse(query).await;
            tracing::debug!(
                workflow = %state.id,
                parser = parser.tier_name(),
                intent = %parsed.intent,
                confidence = parsed.confidence,
                "upstream parse"
            );
            state.parsed = Some(parsed);
        }
        self.variant.prepare(&mut state);

        advance(&mut state, WorkflowStage::LocationExtraction);
        let Some(term) = self.location_term(&state) else {
            fail(&mut state, FailureKind::LocationExtraction, self.variant.extraction_failure());
            return state;
        };
        state.location_search_term = term.clone();

        advance(&mut state, WorkflowStage::LocationResolution);
        let candidates = match self.resolver.resolve(&term).await {
            AgentOutcome::Success { payload } => payload,
            AgentOutcome::NeedsDisambiguation { candidates } => candidates,
            AgentOutcome::Failure { kind, message } => {
                let message = if message.trim().is_empty() {
                    "Location search failed".to_string()
                } else {
                    message
                };
                fail(&mut state, kind, message);
                return state;
            }
        };
        tracing::info!(workflow = %state.id, term = %term, candidates = candidates.len(), "locations resolved");

        if candidates.is_empty() {
            fail(
                &mut state,
                FailureKind::LocationResolution,
                format!("No locations found matching '{term}'"),
            );
            return state;
        }

        state.locations = candidates;
        if needs_disambiguation(&state.locations) {
            state.suspend_for_selection();
            tracing::info!(
                workflow = %state.id,
                options = state.locations.len(),
                "waiting for user to choose a location"
            );
            return state;
        }

        state.needs_disambiguation = false;
        let location = state.locations[0].clone();
        self.retrieve(&mut state, location).await;
        state
    }

    /// Resume a suspended state with the user's choice.
    ///
    /// Out-of-range or negative indices, or a state without candidates,
    /// terminate with `InvalidSelection`.
    pub async fn continue_with_selection(&self, mut state: WorkflowState, index: i64) -> WorkflowState {
        state.clear_outcome();

        if state.kind != V::KIND {
            fail(
                &mut state,
                FailureKind::InvalidSelection,
                "Selection does not belong to this workflow",
            );
            return state;
        }

        let Some(idx) = usize::try_from(index)
            .ok()
            .filter(|i| *i < state.locations.len())
        else {
            tracing::warn!(workflow = %state.id, index, options = state.locations.len(), "invalid selection");
            fail(&mut state, FailureKind::InvalidSelection, "Invalid location selection");
            return state;
        };

        let location = state.locations[idx].clone();
        state.waiting_for_user = false;
        tracing::info!(
            workflow = %state.id,
            index = idx,
            name = %location.name,
            level = %location.level,
            "user selected location"
        );

        self.variant.prepare(&mut state);
        self.retrieve(&mut state, location).await;
        state
    }

    fn location_term(&self, state: &WorkflowState) -> Option<String> {
        let chain = self.variant.chain();
        let from_parser = state
            .parsed
            .as_ref()
            .and_then(|p| p.entity_str("location"))
            .map(|raw| chain.strip_trailing(&clean(raw)))
            .filter(|term| !term.is_empty());
        if let Some(term) = from_parser {
            tracing::debug!(workflow = %state.id, term = %term, "location from upstream parser");
            return Some(term);
        }
        chain.extract(&state.user_query)
    }

    async fn retrieve(&self, state: &mut WorkflowState, location: Location) {
        state.selected_location = Some(location.clone());
        advance(state, WorkflowStage::DataRetrieval);

        if location
            .state_code
            .as_deref()
            .is_none_or(|code| code.trim().is_empty())
        {
            fail(
                state,
                FailureKind::DomainData,
                format!(
                    "State code is required to retrieve PM2.5 data for {}. Please ensure location data includes state_code.",
                    location.name
                ),
            );
            return;
        }

        let request = self.variant.request(state, &location);
        tracing::info!(
            workflow = %state.id,
            agent = self.agent.name(),
            code = %location.code,
            level = %location.level,
            days = ?request.days,
            "fetching domain data"
        );

        match self.agent.run(&request).await {
            AgentOutcome::Success { payload } => {
                let data = DomainData::from_raw(&payload, self.variant.value_keys());
                if data.value.is_none() && data.time_series.is_empty() {
                    fail(
                        state,
                        FailureKind::DomainData,
                        format!("No PM2.5 data available for {}.", location.name),
                    );
                    return;
                }
                let (text, chart) = self.variant.render(state, &location, &data);
                state.domain_data = Some(data);
                state.finish_response(text, chart);
                tracing::info!(
                    workflow = %state.id,
                    chart = state.chart.is_some(),
                    "response ready"
                );
            }
            AgentOutcome::NeedsDisambiguation { candidates } if !candidates.is_empty() => {
                state.locations = candidates;
                state.suspend_for_selection();
                tracing::info!(
                    workflow = %state.id,
                    options = state.locations.len(),
                    "domain agent asked for a narrower location"
                );
            }
            AgentOutcome::NeedsDisambiguation { .. } => {
                let message = self.variant.retrieval_failure(&location, "ambiguous location");
                fail(state, FailureKind::DomainData, message);
            }
            AgentOutcome::Failure { kind, message } => {
                tracing::warn!(
                    workflow = %state.id,
                    agent = self.agent.name(),
                    kind = %kind,
                    error = %message,
                    "domain agent failed"
                );
                let message = self.variant.retrieval_failure(&location, &message);
                fail(state, kind, message);
            }
        }
    }
}

fn advance(state: &mut WorkflowState, stage: WorkflowStage) {
    tracing::info!(workflow = %state.id, from = ?state.stage, to = ?stage, "workflow stage");
    state.stage = stage;
}

fn fail(state: &mut WorkflowState, kind: FailureKind, message: impl Into<String>) {
    let message = message.into();
    tracing::info!(workflow = %state.id, from = ?state.stage, kind = %kind, error = %message, "workflow failed");
    state.finish_error(kind, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FORECAST_CHART;
    use crate::mock::{MockDomainAgent, MockLocationResolver};
    use aq_parser::mock::StaticParser;
    use aq_protocol::Intent;
    use serde_json::json;

    fn current(
        resolver: MockLocationResolver,
        agent: MockDomainAgent,
    ) -> (CurrentReadingWorkflow, Arc<MockLocationResolver>, Arc<MockDomainAgent>) {
        let resolver = Arc::new(resolver);
        let agent = Arc::new(agent);
        let wf = Workflow::new(CurrentReading, resolver.clone(), agent.clone());
        (wf, resolver, agent)
    }

    fn forecast(resolver: MockLocationResolver, agent: MockDomainAgent) -> (ForecastWorkflow, Arc<MockDomainAgent>) {
        let agent = Arc::new(agent);
        let wf = Workflow::new(Forecast, Arc::new(resolver), agent.clone());
        (wf, agent)
    }

    fn assert_terminal(state: &WorkflowState) {
        assert!(!state.waiting_for_user);
        assert!(
            state.error.is_some() != !state.response.is_empty(),
            "exactly one of response/error must be set: {state:?}"
        );
    }

    #[tokio::test]
    async fn single_candidate_goes_straight_to_response() {
        let (wf, resolver, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("What is PM2.5 in Lucknow?").await;

        assert_terminal(&state);
        assert_eq!(state.stage, WorkflowStage::ResponseReady);
        assert_eq!(state.location_search_term, "lucknow");
        assert!(!state.needs_disambiguation);
        assert_eq!(state.selected_location.as_ref().unwrap().code, "0912");
        assert!(state.response.contains("87.5 µg/m³"));
        assert_eq!(state.domain_data.as_ref().unwrap().value, Some(87.46));
        assert_eq!(resolver.terms().await, ["lucknow"]);
        assert_eq!(agent.requests().await[0].query, "What is PM2.5 in Lucknow?");
    }

    #[tokio::test]
    async fn identical_name_and_level_auto_selects_first() {
        let (wf, _, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("pm2.5 in kanpur").await;

        assert_terminal(&state);
        assert!(!state.needs_disambiguation);
        assert_eq!(state.locations.len(), 2);
        assert_eq!(state.selected_location.unwrap().code, "0926");
        assert_eq!(agent.requests().await[0].location.code, "0926");
    }

    #[tokio::test]
    async fn differing_levels_suspend_for_selection() {
        let (wf, _, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("air quality in Aurangabad").await;

        assert!(state.needs_disambiguation);
        assert!(state.waiting_for_user);
        assert_eq!(state.stage, WorkflowStage::DisambiguationPending);
        assert!(state.response.is_empty());
        assert!(state.error.is_none());
        assert!(state.selected_location.is_none());
        assert!(agent.requests().await.is_empty());
    }

    #[tokio::test]
    async fn resume_with_valid_index() {
        let (wf, _, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let suspended = wf.process_query("air quality in Aurangabad").await;
        let state = wf.continue_with_selection(suspended, 1).await;

        assert_terminal(&state);
        assert_eq!(state.stage, WorkflowStage::ResponseReady);
        assert_eq!(state.selected_location.as_ref().unwrap().code, "1025");
        assert!(state.needs_disambiguation);
        assert!(state.response.contains("Aurangabad City"));
        assert_eq!(agent.requests().await[0].location.code, "1025");
    }

    #[tokio::test]
    async fn resume_survives_json_roundtrip() {
        let (wf, _, _) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let suspended = wf.process_query("air quality in Aurangabad").await;
        let stored = serde_json::to_string(&suspended).unwrap();
        let restored: WorkflowState = serde_json::from_str(&stored).unwrap();

        let state = wf.continue_with_selection(restored, 0).await;
        assert_eq!(state.id, suspended.id);
        assert_eq!(state.selected_location.unwrap().code, "2719");
        assert!(!state.response.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_selection_is_an_error_state() {
        let (wf, _, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let suspended = wf.process_query("air quality in Aurangabad").await;
        let len = suspended.locations.len() as i64;

        for index in [-1, len] {
            let state = wf.continue_with_selection(suspended.clone(), index).await;
            assert_terminal(&state);
            assert_eq!(state.error.as_deref(), Some("Invalid location selection"));
            assert_eq!(state.error_kind, Some(FailureKind::InvalidSelection));
        }
        assert!(agent.requests().await.is_empty());
    }

    #[tokio::test]
    async fn selection_without_candidates_is_an_error_state() {
        let (wf, _, _) = current(MockLocationResolver::new(), MockDomainAgent::current_sample());
        let fresh = WorkflowState::new(WorkflowKind::CurrentReading, "pm in delhi");
        let state = wf.continue_with_selection(fresh, 0).await;
        assert_eq!(state.error_kind, Some(FailureKind::InvalidSelection));
    }

    #[tokio::test]
    async fn selection_from_other_variant_is_rejected() {
        let (wf, _) = forecast(MockLocationResolver::with_india_sample(), MockDomainAgent::forecast_sample());
        let mut foreign = WorkflowState::new(WorkflowKind::CurrentReading, "pm in lucknow");
        foreign.locations = vec![Location::new("0912", "district", "Lucknow").with_state("09", "Uttar Pradesh")];
        let state = wf.continue_with_selection(foreign, 0).await;
        assert_eq!(state.error_kind, Some(FailureKind::InvalidSelection));
    }

    #[tokio::test]
    async fn extraction_failure_stops_early() {
        let (wf, resolver, _) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("what is the aqi?").await;

        assert_terminal(&state);
        assert_eq!(state.error_kind, Some(FailureKind::LocationExtraction));
        assert!(state.error.unwrap().starts_with("Could not identify a location"));
        assert!(resolver.terms().await.is_empty());
    }

    #[tokio::test]
    async fn no_candidates_is_an_error_state() {
        let (wf, _, _) = current(MockLocationResolver::new(), MockDomainAgent::current_sample());
        let state = wf.process_query("pm2.5 in atlantis").await;
        assert_terminal(&state);
        assert_eq!(state.error.as_deref(), Some("No locations found matching 'atlantis'"));
        assert_eq!(state.error_kind, Some(FailureKind::LocationResolution));
    }

    #[tokio::test]
    async fn resolver_failure_message_is_kept() {
        let (wf, _, _) = current(
            MockLocationResolver::new().failing(FailureKind::Unavailable, "gazetteer offline"),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("pm2.5 in delhi").await;
        assert_eq!(state.error.as_deref(), Some("gazetteer offline"));
        assert_eq!(state.error_kind, Some(FailureKind::Unavailable));
    }

    #[tokio::test]
    async fn resolver_failure_without_message_gets_default() {
        let (wf, _, _) = current(
            MockLocationResolver::new().failing(FailureKind::LocationResolution, ""),
            MockDomainAgent::current_sample(),
        );
        let state = wf.process_query("pm2.5 in delhi").await;
        assert_eq!(state.error.as_deref(), Some("Location search failed"));
    }

    #[tokio::test]
    async fn missing_state_code_fails_before_agent_call() {
        let resolver = MockLocationResolver::new()
            .with_place("pune", vec![Location::new("2725", "district", "Pune")]);
        let (wf, _, agent) = current(resolver, MockDomainAgent::current_sample());
        let state = wf.process_query("aqi in pune").await;

        assert_terminal(&state);
        assert_eq!(state.error_kind, Some(FailureKind::DomainData));
        assert!(state.error.unwrap().contains("State code is required"));
        assert!(agent.requests().await.is_empty());
    }

    #[tokio::test]
    async fn empty_domain_row_is_an_error_state() {
        let (wf, _, _) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::new("empty").with_fallback(json!({"pm25_value": null})),
        );
        let state = wf.process_query("pm2.5 in lucknow").await;
        assert_terminal(&state);
        assert_eq!(state.error.as_deref(), Some("No PM2.5 data available for Lucknow."));
    }

    #[tokio::test]
    async fn forecast_with_horizon_and_chart() {
        let (wf, agent) = forecast(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::forecast_sample(),
        );
        let state = wf.process_query("PM2.5 forecast for Lucknow next 3 days").await;

        assert_terminal(&state);
        assert_eq!(state.kind, WorkflowKind::Forecast);
        assert_eq!(state.forecast_days, Some(3));
        assert_eq!(agent.requests().await[0].days, Some(3));
        assert!(state.response.contains("Next 3 days"));
        assert!(state.response.contains("Poor"));

        let chart = state.chart.unwrap();
        assert_eq!(chart.chart_type, FORECAST_CHART);
        assert_eq!(chart.points[0].time, "2025-01-14T00:00:00Z");
    }

    #[tokio::test]
    async fn forecast_agent_failure_names_location() {
        let (wf, _) = forecast(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::new("down").failing(FailureKind::DomainData, "connection refused"),
        );
        let state = wf.process_query("Lucknow PM2.5 forecast").await;

        assert_terminal(&state);
        assert_eq!(
            state.error.as_deref(),
            Some("Could not retrieve PM2.5 forecast for Lucknow. The forecasting service might be unavailable.")
        );
    }

    #[tokio::test]
    async fn forecast_resume_keeps_horizon() {
        let (wf, agent) = forecast(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::forecast_sample(),
        );
        let suspended = wf.process_query("forecast pm2.5 aurangabad next week").await;
        assert!(suspended.waiting_for_user);
        assert_eq!(suspended.forecast_days, Some(7));

        let state = wf.continue_with_selection(suspended, 0).await;
        assert_terminal(&state);
        assert_eq!(agent.requests().await[0].days, Some(7));
    }

    #[tokio::test]
    async fn upstream_parser_location_and_entities_are_used() {
        let mut entities = Entities::new();
        entities.insert("metric".into(), json!("pm25"));
        entities.insert("location".into(), json!("Lucknow"));
        let parser = Arc::new(StaticParser::new(Intent::CurrentReading, entities, 0.95));

        let (wf, resolver, agent) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let wf = wf.with_parser(parser.clone());
        let state = wf.process_query("how's it looking out there?").await;

        assert_terminal(&state);
        assert!(state.error.is_none());
        assert_eq!(parser.calls(), 1);
        assert_eq!(resolver.terms().await, ["lucknow"]);
        assert_eq!(agent.requests().await[0].entities["metric"], "pm25");
        assert!(state.parsed.is_some());
    }

    #[tokio::test]
    async fn upstream_parser_without_location_falls_back_to_chain() {
        let parser = Arc::new(StaticParser::unknown());
        let (wf, resolver, _) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        let wf = wf.with_parser(parser);
        let state = wf.process_query("Lucknow AQI").await;
        assert!(state.error.is_none());
        assert_eq!(resolver.terms().await, ["lucknow"]);
    }

    #[tokio::test]
    async fn every_terminal_state_has_exactly_one_outcome() {
        let (wf, _, _) = current(
            MockLocationResolver::with_india_sample(),
            MockDomainAgent::current_sample(),
        );
        for query in [
            "What is PM2.5 in Lucknow?",
            "pm2.5 in kanpur",
            "pm2.5 in atlantis",
            "what is the aqi",
            "",
        ] {
            let state = wf.process_query(query).await;
            assert_terminal(&state);
        }
    }

    #[test]
    fn collapse_rule() {
        let a = Location::new("1", "district", "Aurangabad");
        let b = Location::new("2", "district", "Aurangabad");
        let c = Location::new("3", "city", "Aurangabad");
        assert!(!needs_disambiguation(&[a.clone()]));
        assert!(!needs_disambiguation(&[a.clone(), b.clone()]));
        assert!(needs_disambiguation(&[a.clone(), c]));
        assert!(needs_disambiguation(&[a, Location::new("4", "district", "Aurangabad Rural")]));
    }
}
