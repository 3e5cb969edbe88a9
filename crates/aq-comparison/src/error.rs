//! Comparison logging and analysis error types.

use thiserror::Error;

/// Errors from recording or analysing parser comparisons.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("log not found: {0}")]
    NotFound(String),

    #[error("no comparisons found")]
    NoComparisons,

    #[error("log is closed")]
    Closed,
}

/// Convenience alias for comparison results.
pub type ComparisonResult<T> = Result<T, ComparisonError>;
