//! Append-only durable comparison log: writer and tolerant reader.
//!
//! Each entry is one self-contained JSON object, optionally preceded by
//! framing text on the same line. Readers locate each `{` and decode a
//! single value from there, so compact, pretty-printed, and framed
//! entries can share a file.

use std::path::{Path, PathBuf};

use aq_protocol::ComparisonRecord;
use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{ComparisonError, ComparisonResult};

/// Framing written before each entry when framing is enabled.
pub const FRAME_PREFIX: &str = "[parse_comparison] ";

/// Writer for the durable comparison log.
///
/// Opened once at startup and closed at shutdown. Each append writes a
/// whole entry under the lock, so concurrent appends never interleave.
pub struct DurableLog {
    path: PathBuf,
    framing: bool,
    file: Mutex<Option<File>>,
}

impl DurableLog {
    /// Open (creating if needed) the log at `path` in append mode.
    pub async fn open(path: impl AsRef<Path>, framing: bool) -> ComparisonResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(path = %path.display(), framing, "durable comparison log opened");
        Ok(Self {
            path,
            framing,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single write.
    pub async fn append(&self, record: &ComparisonRecord) -> ComparisonResult<()> {
        let mut entry = String::new();
        if self.framing {
            entry.push_str(FRAME_PREFIX);
        }
        entry.push_str(&serde_json::to_string(record)?);
        entry.push('\n');

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(ComparisonError::Closed)?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn flush(&self) -> ComparisonResult<()> {
        if let Some(file) = self.file.lock().await.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }

    /// Flush and release the file. Later appends fail with `Closed`.
    pub async fn close(&self) -> ComparisonResult<()> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
            file.sync_all().await?;
            tracing::info!(path = %self.path.display(), "durable comparison log closed");
        }
        Ok(())
    }
}

/// Read every decodable record from a durable log.
pub async fn read_records(path: impl AsRef<Path>) -> ComparisonResult<Vec<ComparisonRecord>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ComparisonError::NotFound(path.display().to_string())
        } else {
            ComparisonError::Io(e)
        }
    })?;
    Ok(parse_records(&text))
}

/// Read records whose timestamp is at or after `cutoff`.
pub async fn read_records_since(
    path: impl AsRef<Path>,
    cutoff: DateTime<Utc>,
) -> ComparisonResult<Vec<ComparisonRecord>> {
    let mut records = read_records(path).await?;
    records.retain(|r| r.timestamp >= cutoff);
    Ok(records)
}

/// Decode all records from log text, skipping framing and broken spans.
pub fn parse_records(text: &str) -> Vec<ComparisonRecord> {
    let mut records = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();

        match stream.next() {
            Some(Ok(value)) => {
                pos = start + stream.byte_offset();
                match serde_json::from_value::<ComparisonRecord>(value) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::debug!(error = %e, "skipping non-comparison JSON entry"),
                }
            }
            _ => {
                // Resume on the next line; a broken entry never poisons the rest.
                match text[start..].find('\n') {
                    Some(nl) => pos = start + nl + 1,
                    None => break,
                }
            }
        }
    }

    records
}
