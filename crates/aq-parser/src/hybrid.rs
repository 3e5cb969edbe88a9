//! Hybrid orchestrator: pattern parser first, model parser for comparison
//! (shadow mode) or as a low-confidence fallback (production mode).
//!
//! Shadow work goes through a bounded queue drained by one supervisor
//! task. Each job runs inside a `JoinSet`, so a failing or panicking job
//! is logged and counted without touching the caller.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aq_comparison::{ComparisonRecorder, ComparisonResult, ComparisonStats};
use aq_protocol::ParsedQuery;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::QueryParser;
use crate::compare::build_record;
use crate::pattern::PatternParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Always return the pattern result; run the model only for comparison.
    #[default]
    Shadow,
    /// Return the model result when the pattern parser is unsure.
    Production,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shadow" => Ok(Self::Shadow),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown parser mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridConfig {
    #[serde(default)]
    pub mode: ParseMode,
    /// Pattern results at or above this are returned as-is in production mode.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Bound on the production-mode model call.
    #[serde(default = "default_production_timeout_secs")]
    pub production_timeout_secs: u64,
    #[serde(default = "default_shadow_queue_capacity")]
    pub shadow_queue_capacity: usize,
}

fn default_confidence_threshold() -> f64 {
    0.85
}
fn default_production_timeout_secs() -> u64 {
    5
}
fn default_shadow_queue_capacity() -> usize {
    256
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::default(),
            confidence_threshold: default_confidence_threshold(),
            production_timeout_secs: default_production_timeout_secs(),
            shadow_queue_capacity: default_shadow_queue_capacity(),
        }
    }
}

#[derive(Default)]
struct ShadowStats {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time counters for the shadow queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShadowStatsSnapshot {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl ShadowStats {
    fn snapshot(&self) -> ShadowStatsSnapshot {
        ShadowStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct ShadowJob {
    query: String,
    regex: ParsedQuery,
}

/// Single entry point wrapping both parsers.
pub struct HybridParser {
    pattern: PatternParser,
    llm: Arc<dyn QueryParser>,
    recorder: Arc<ComparisonRecorder>,
    config: HybridConfig,
    queue: Mutex<Option<mpsc::Sender<ShadowJob>>>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    stats: Arc<ShadowStats>,
}

impl HybridParser {
    /// Build the orchestrator and start its shadow supervisor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        pattern: PatternParser,
        llm: Arc<dyn QueryParser>,
        recorder: Arc<ComparisonRecorder>,
        config: HybridConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.shadow_queue_capacity.max(1));
        let stats = Arc::new(ShadowStats::default());
        let supervisor = tokio::spawn(run_supervisor(
            rx,
            llm.clone(),
            recorder.clone(),
            stats.clone(),
        ));

        tracing::info!(
            mode = ?config.mode,
            threshold = config.confidence_threshold,
            model_tier = llm.tier_name(),
            "hybrid parser started"
        );

        Self {
            pattern,
            llm,
            recorder,
            config,
            queue: Mutex::new(Some(tx)),
            supervisor: tokio::sync::Mutex::new(Some(supervisor)),
            stats,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.config.mode
    }

    pub fn recorder(&self) -> &Arc<ComparisonRecorder> {
        &self.recorder
    }

    /// Parse one query according to the configured mode.
    pub async fn parse_query(&self, query: &str) -> ParsedQuery {
        let regex = self.pattern.parse_text(query);

        match self.config.mode {
            ParseMode::Shadow => {
                self.enqueue_shadow(query, &regex);
                regex
            }
            ParseMode::Production if regex.confidence >= self.config.confidence_threshold => {
                self.enqueue_shadow(query, &regex);
                regex
            }
            ParseMode::Production => {
                let secs = self.config.production_timeout_secs;
                let llm = match timeout(Duration::from_secs(secs), self.llm.parse(query)).await {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        tracing::warn!(timeout_secs = secs, "model parse timed out in production mode");
                        ParsedQuery::failed(query, format!("model timed out after {secs}s"))
                    }
                };
                if let Err(e) = self.recorder.record(build_record(query, &regex, &llm)).await {
                    tracing::warn!(error = %e, "failed to record production comparison");
                }
                llm
            }
        }
    }

    /// Live stats over the recorder's in-memory buffer.
    pub fn comparison_stats(&self) -> ComparisonStats {
        self.recorder.stats()
    }

    pub fn shadow_stats(&self) -> ShadowStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting shadow work and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        let sender = self.queue.lock().unwrap_or_else(|p| p.into_inner()).take();
        drop(sender);

        if let Some(handle) = self.supervisor.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "shadow supervisor ended abnormally");
        }
        tracing::info!(stats = ?self.stats.snapshot(), "hybrid parser shut down");
    }

    /// Never blocks: a full or closed queue drops the job.
    fn enqueue_shadow(&self, query: &str, regex: &ParsedQuery) {
        let sender = self.queue.lock().unwrap_or_else(|p| p.into_inner()).clone();
        let Some(sender) = sender else {
            let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "shadow queue closed, dropping comparison");
            return;
        };

        let job = ShadowJob {
            query: query.to_string(),
            regex: regex.clone(),
        };
        match sender.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(error = %e, dropped, "shadow queue full, dropping comparison");
            }
        }
    }
}

#[async_trait]
impl QueryParser for HybridParser {
    async fn parse(&self, text: &str) -> ParsedQuery {
        self.parse_query(text).await
    }

    fn tier_name(&self) -> &str {
        "hybrid"
    }
}

async fn run_supervisor(
    mut rx: mpsc::Receiver<ShadowJob>,
    llm: Arc<dyn QueryParser>,
    recorder: Arc<ComparisonRecorder>,
    stats: Arc<ShadowStats>,
) {
    let mut jobs = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    jobs.spawn(run_shadow_job(job, llm.clone(), recorder.clone()));
                }
                None => break,
            },
            Some(result) = jobs.join_next(), if !jobs.is_empty() => {
                settle(result, &stats);
            }
        }
    }

    while let Some(result) = jobs.join_next().await {
        settle(result, &stats);
    }
}

async fn run_shadow_job(
    job: ShadowJob,
    llm: Arc<dyn QueryParser>,
    recorder: Arc<ComparisonRecorder>,
) -> ComparisonResult<()> {
    let llm_result = llm.parse(&job.query).await;
    recorder
        .record(build_record(&job.query, &job.regex, &llm_result))
        .await
}

fn settle(result: Result<ComparisonResult<()>, JoinError>, stats: &ShadowStats) {
    match result {
        Ok(Ok(())) => {
            stats.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "shadow comparison failed");
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "shadow comparison task panicked");
        }
    }
}
