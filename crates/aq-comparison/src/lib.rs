//! Parser comparison recording and analysis.
//!
//! Every hybrid-parser decision produces a `ComparisonRecord`. The
//! `ComparisonRecorder` keeps the most recent ones in memory for live
//! stats and appends each to a durable log; the `ComparisonAnalyzer`
//! reads that log back for offline reports. A lighter `DailyLogger`
//! writes one JSONL file per day for batch agreement summaries.

pub mod analyzer;
pub mod daily;
pub mod durable;
pub mod error;
pub mod recorder;

pub use analyzer::{AnalysisReport, ComparisonAnalyzer};
pub use daily::{DailyLogger, DailyRecord, ShadowSummary};
pub use durable::{DurableLog, read_records};
pub use error::{ComparisonError, ComparisonResult};
pub use recorder::{ComparisonRecorder, ComparisonStats, DEFAULT_BUFFER_CAPACITY};
