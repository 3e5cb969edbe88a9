//! Natural-language query parsing for air-quality questions.
//!
//! Converts user text ("what is pm2.5 in delhi?") into a `ParsedQuery`
//! with intent, entities, and confidence.
//!
//! Two tiers:
//! - **Pattern** (local): ordered regex rule table, synchronous, no I/O.
//! - **Model** (remote): external inference service, defensive decoding.
//!
//! `HybridParser` combines them in shadow or production mode and records
//! a comparison for every decision.

pub mod compare;
pub mod error;
pub mod hybrid;
pub mod llm;
pub mod mock;
pub mod pattern;

use async_trait::async_trait;
use aq_protocol::ParsedQuery;

/// Anything that can turn text into a `ParsedQuery`.
///
/// Implementations never fail: problems are downgraded to an `unknown`
/// result with confidence 0.0.
#[async_trait]
pub trait QueryParser: Send + Sync {
    async fn parse(&self, text: &str) -> ParsedQuery;

    /// Name of this parser tier (for logging/audit).
    fn tier_name(&self) -> &str;
}

pub use compare::{build_record, compute_differences, is_llm_better};
pub use error::ParserError;
pub use hybrid::{HybridConfig, HybridParser, ParseMode, ShadowStatsSnapshot};
pub use llm::{LlmConfig, LlmParser, ModelResponse, Transport};
pub use pattern::PatternParser;
