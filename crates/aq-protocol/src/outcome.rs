//! Tagged results exchanged with collaborators and recorded on workflow state.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Why a request could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No extraction strategy produced a location term.
    LocationExtraction,
    /// The resolver errored or found nothing.
    LocationResolution,
    /// The domain agent errored or had no data.
    DomainData,
    /// Resumption with a missing or out-of-range selection index.
    InvalidSelection,
    /// The collaborator itself is unreachable or misbehaving.
    Unavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocationExtraction => "location_extraction",
            Self::LocationResolution => "location_resolution",
            Self::DomainData => "domain_data",
            Self::InvalidSelection => "invalid_selection",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a collaborator call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome<T> {
    Success { payload: T },
    NeedsDisambiguation { candidates: Vec<Location> },
    Failure { kind: FailureKind, message: String },
}

impl<T> AgentOutcome<T> {
    pub fn success(payload: T) -> Self {
        Self::Success { payload }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
