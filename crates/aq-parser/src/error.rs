use thiserror::Error;

/// Failures talking to the external inference service.
///
/// Never leaves the crate as an error: `LlmParser` turns every variant
/// into an `unknown` result carrying the message.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API error: {0}")]
    Status(u16),

    #[error("model timed out after {0}s")]
    Timeout(u64),

    #[error("model parser disabled")]
    Disabled,
}
