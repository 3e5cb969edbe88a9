//! Rolling per-day comparison logger for lightweight batch analysis.
//!
//! One JSONL file per UTC day (`comparison_YYYYMMDD.jsonl`), one record
//! per line. The schema is a subset of `ComparisonRecord` plus the
//! `agreement` and `entity_match` flags.

use std::path::{Path, PathBuf};

use aq_protocol::{ComparisonRecord, Intent, ParseSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{ComparisonError, ComparisonResult};

/// One line of a daily comparison file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(deserialize_with = "aq_protocol::time::deserialize_flexible")]
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub regex: ParseSnapshot,
    pub llm: ParseSnapshot,
    /// Both parsers chose the same intent.
    pub agreement: bool,
    /// Both parsers produced identical entity maps.
    pub entity_match: bool,
}

impl From<&ComparisonRecord> for DailyRecord {
    fn from(record: &ComparisonRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            query: record.query.clone(),
            regex: record.regex_result.clone(),
            llm: record.llm_result.clone(),
            agreement: record.regex_result.intent == record.llm_result.intent,
            entity_match: record.regex_result.entities == record.llm_result.entities,
        }
    }
}

/// Writes daily JSONL files under a directory.
pub struct DailyLogger {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl DailyLogger {
    /// Create the logger, making `dir` if it does not exist.
    pub async fn open(dir: impl AsRef<Path>) -> ComparisonResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds records for the given instant's day.
    pub fn file_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("comparison_{}.jsonl", at.format("%Y%m%d")))
    }

    pub async fn log(&self, record: &ComparisonRecord) -> ComparisonResult<()> {
        let daily = DailyRecord::from(record);
        let mut line = serde_json::to_string(&daily)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(record.timestamp))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Load every record from every `*.jsonl` file in `dir`, by file name order.
    pub async fn load_all(dir: impl AsRef<Path>) -> ComparisonResult<Vec<DailyRecord>> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ComparisonError::NotFound(dir.display().to_string())
            } else {
                ComparisonError::Io(e)
            }
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
        files.sort();

        let mut records = Vec::new();
        for file in files {
            let text = tokio::fs::read_to_string(&file).await?;
            for (i, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<DailyRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::debug!(
                        file = %file.display(),
                        line = i + 1,
                        error = %e,
                        "skipping malformed daily record"
                    ),
                }
            }
        }
        Ok(records)
    }
}

/// Batch summary over daily records: is the model ready to take over?
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShadowSummary {
    pub total_queries: usize,
    /// Fraction in [0, 1] of queries where intents agreed.
    pub agreement_rate: f64,
    /// Fraction in [0, 1] of queries where entity maps matched.
    pub entity_match_rate: f64,
    pub llm_higher_confidence: usize,
    pub regex_failures: usize,
    /// Regex failures for which the model still found an intent.
    pub regex_failures_recovered: usize,
}

impl ShadowSummary {
    pub fn from_records(records: &[DailyRecord]) -> Self {
        let total = records.len();
        if total == 0 {
            return Self::default();
        }
        let rate = |n: usize| n as f64 / total as f64;
        let regex_failures: Vec<_> = records
            .iter()
            .filter(|r| r.regex.intent == Intent::Unknown)
            .collect();

        Self {
            total_queries: total,
            agreement_rate: rate(records.iter().filter(|r| r.agreement).count()),
            entity_match_rate: rate(records.iter().filter(|r| r.entity_match).count()),
            llm_higher_confidence: records
                .iter()
                .filter(|r| r.llm.confidence > r.regex.confidence)
                .count(),
            regex_failures: regex_failures.len(),
            regex_failures_recovered: regex_failures
                .iter()
                .filter(|r| r.llm.intent != Intent::Unknown)
                .count(),
        }
    }
}
