//! Bounded in-memory comparison buffer plus durable sinks.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use aq_protocol::ComparisonRecord;
use serde::Serialize;

use crate::daily::DailyLogger;
use crate::durable::DurableLog;
use crate::error::ComparisonResult;

/// Records kept in memory for live stats.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Aggregate stats over the in-memory buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub total_comparisons: usize,
    pub llm_better_count: usize,
    pub llm_better_percentage: f64,
    pub avg_regex_confidence: f64,
    pub avg_llm_confidence: f64,
    pub intent_differences: usize,
    pub entity_differences: usize,
}

/// Receives every orchestrator decision.
///
/// The buffer holds the most recent `capacity` records, oldest evicted
/// first. Appends are serialized so buffer order and durable-log order
/// always agree.
pub struct ComparisonRecorder {
    capacity: usize,
    buffer: Mutex<VecDeque<ComparisonRecord>>,
    durable: Option<DurableLog>,
    daily: Option<DailyLogger>,
    sequence: tokio::sync::Mutex<()>,
}

impl ComparisonRecorder {
    /// In-memory only recorder.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            durable: None,
            daily: None,
            sequence: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_durable_log(mut self, log: DurableLog) -> Self {
        self.durable = Some(log);
        self
    }

    pub fn with_daily_logger(mut self, logger: DailyLogger) -> Self {
        self.daily = Some(logger);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn durable_log(&self) -> Option<&DurableLog> {
        self.durable.as_ref()
    }

    /// Record one comparison in every configured sink.
    ///
    /// The in-memory append always happens. If a durable sink fails the
    /// remaining sinks are still attempted and the first error is returned.
    pub async fn record(&self, record: ComparisonRecord) -> ComparisonResult<()> {
        let _order = self.sequence.lock().await;

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(record.clone());
        }

        let mut first_error = None;
        if let Some(log) = &self.durable
            && let Err(e) = log.append(&record).await
        {
            tracing::warn!(error = %e, "durable comparison append failed");
            first_error = Some(e);
        }
        if let Some(daily) = &self.daily
            && let Err(e) = daily.log(&record).await
        {
            tracing::warn!(error = %e, "daily comparison append failed");
            first_error.get_or_insert(e);
        }

        tracing::debug!(
            query = %record.query,
            llm_better = record.llm_better,
            "comparison recorded"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Snapshot of the buffer, oldest first.
    pub fn recent(&self) -> Vec<ComparisonRecord> {
        self.lock_buffer().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_buffer().is_empty()
    }

    /// Live aggregate stats over the buffer.
    pub fn stats(&self) -> ComparisonStats {
        let buffer = self.lock_buffer();
        let total = buffer.len();
        if total == 0 {
            return ComparisonStats::default();
        }

        let llm_better_count = buffer.iter().filter(|r| r.llm_better).count();
        let regex_sum: f64 = buffer.iter().map(|r| r.regex_result.confidence).sum();
        let llm_sum: f64 = buffer.iter().map(|r| r.llm_result.confidence).sum();

        ComparisonStats {
            total_comparisons: total,
            llm_better_count,
            llm_better_percentage: llm_better_count as f64 / total as f64 * 100.0,
            avg_regex_confidence: regex_sum / total as f64,
            avg_llm_confidence: llm_sum / total as f64,
            intent_differences: buffer
                .iter()
                .filter(|r| r.differences.intent.is_some())
                .count(),
            entity_differences: buffer
                .iter()
                .filter(|r| r.differences.entities.is_some())
                .count(),
        }
    }

    pub async fn flush(&self) -> ComparisonResult<()> {
        if let Some(log) = &self.durable {
            log.flush().await?;
        }
        Ok(())
    }

    /// Flush and close durable sinks.
    pub async fn close(&self) -> ComparisonResult<()> {
        if let Some(log) = &self.durable {
            log.close().await?;
        }
        Ok(())
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<ComparisonRecord>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ComparisonRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_protocol::{Differences, EntityDiff, Intent, IntentDiff, ParseSnapshot};
    use chrono::Utc;
    use std::sync::Arc;

    fn snapshot(intent: Intent, confidence: f64) -> ParseSnapshot {
        ParseSnapshot {
            intent,
            entities: Default::default(),
            confidence,
        }
    }

    fn record(i: usize, llm_better: bool) -> ComparisonRecord {
        ComparisonRecord {
            timestamp: Utc::now(),
            query: format!("query {i}"),
            regex_result: snapshot(Intent::CurrentReading, 0.8),
            llm_result: snapshot(Intent::CurrentReading, 0.6),
            differences: Differences::default(),
            llm_better,
        }
    }

    #[tokio::test]
    async fn buffer_keeps_most_recent_hundred_in_order() {
        let recorder = ComparisonRecorder::default();
        for i in 0..130 {
            recorder.record(record(i, false)).await.unwrap();
        }
        let recent = recorder.recent();
        assert_eq!(recent.len(), 100);
        assert_eq!(recent.first().unwrap().query, "query 30");
        assert_eq!(recent.last().unwrap().query, "query 129");
        for (offset, r) in recent.iter().enumerate() {
            assert_eq!(r.query, format!("query {}", offset + 30));
        }
    }

    #[tokio::test]
    async fn stats_over_buffer() {
        let recorder = ComparisonRecorder::new(10);
        let mut differing = record(0, true);
        differing.llm_result = snapshot(Intent::Trend, 0.95);
        differing.differences = Differences {
            intent: Some(IntentDiff {
                regex: Intent::CurrentReading,
                llm: Intent::Trend,
            }),
            entities: Some(EntityDiff::default()),
            confidence_diff: Some(0.15),
        };
        recorder.record(differing).await.unwrap();
        recorder.record(record(1, false)).await.unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.total_comparisons, 2);
        assert_eq!(stats.llm_better_count, 1);
        assert!((stats.llm_better_percentage - 50.0).abs() < 1e-9);
        assert!((stats.avg_regex_confidence - 0.8).abs() < 1e-9);
        assert!((stats.avg_llm_confidence - 0.775).abs() < 1e-9);
        assert_eq!(stats.intent_differences, 1);
        assert_eq!(stats.entity_differences, 1);
    }

    #[test]
    fn empty_stats_are_zero() {
        let recorder = ComparisonRecorder::default();
        assert_eq!(recorder.stats(), ComparisonStats::default());
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let path = std::env::temp_dir()
            .join(format!("aq-recorder-{}", uuid::Uuid::new_v4()))
            .join("comparisons.log");
        let log = DurableLog::open(&path, true).await.unwrap();
        let recorder = Arc::new(ComparisonRecorder::new(500).with_durable_log(log));

        let mut handles = Vec::new();
        for i in 0..50 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                recorder.record(record(i, i % 2 == 0)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        recorder.close().await.unwrap();

        let from_disk = crate::durable::read_records(&path).await.unwrap();
        let in_memory = recorder.recent();
        assert_eq!(from_disk.len(), 50);
        let disk_queries: Vec<_> = from_disk.iter().map(|r| &r.query).collect();
        let memory_queries: Vec<_> = in_memory.iter().map(|r| &r.query).collect();
        assert_eq!(disk_queries, memory_queries);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(ComparisonRecorder::new(0).capacity(), 1);
    }
}
