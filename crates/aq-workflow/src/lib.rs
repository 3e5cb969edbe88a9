//! Resolution workflow: query text → location → domain data → reply.
//!
//! One engine (`Workflow<V>`) drives the stages; a `WorkflowVariant`
//! supplies what differs between current readings and forecasts (the
//! extraction chain, the domain request, and the response template).
//!
//! Collaborators are injected as trait objects so tests can swap in the
//! mocks from [`mock`].

pub mod agents;
pub mod extract;
pub mod format;
pub mod horizon;
pub mod mock;
pub mod workflow;

pub use agents::{DomainAgent, DomainRequest, LocationResolver, LocationSearch, RowLocationResolver};
pub use extract::ExtractionChain;
pub use format::AqiCategory;
pub use horizon::forecast_days;
pub use workflow::{
    CurrentReading, CurrentReadingWorkflow, Forecast, ForecastWorkflow, Workflow, WorkflowVariant,
};
