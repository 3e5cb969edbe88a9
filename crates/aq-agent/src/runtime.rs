//! Builds the parser and recorder stack from configuration and runs the
//! CLI commands against it.

use std::sync::Arc;

use anyhow::Context;
use aq_comparison::{
    AnalysisReport, ComparisonAnalyzer, ComparisonRecorder, DailyLogger, DurableLog, ShadowSummary,
};
use aq_parser::{HybridParser, LlmParser, PatternParser, QueryParser};
use aq_protocol::ParsedQuery;

use crate::config::{AppConfig, ComparisonConfig};

/// Open the durable log (and daily logger, when configured) behind a recorder.
pub async fn build_recorder(config: &ComparisonConfig) -> anyhow::Result<ComparisonRecorder> {
    let log = DurableLog::open(&config.log_path, config.framing)
        .await
        .with_context(|| format!("opening comparison log {}", config.log_path.display()))?;
    let mut recorder = ComparisonRecorder::new(config.buffer_capacity).with_durable_log(log);

    if let Some(dir) = &config.daily_dir {
        let daily = DailyLogger::open(dir)
            .await
            .with_context(|| format!("opening daily comparison dir {}", dir.display()))?;
        recorder = recorder.with_daily_logger(daily);
    }
    Ok(recorder)
}

/// Pattern tier plus the configured model tier, sharing one recorder.
pub fn build_parser(config: &AppConfig, recorder: Arc<ComparisonRecorder>) -> anyhow::Result<HybridParser> {
    let llm: Arc<dyn QueryParser> = Arc::new(LlmParser::new(config.llm.clone())?);
    Ok(HybridParser::new(
        PatternParser::new(),
        llm,
        recorder,
        config.parser.clone(),
    ))
}

/// Parse one query, then drain shadow work and close the logs.
pub async fn parse_once(config: &AppConfig, text: &str) -> anyhow::Result<ParsedQuery> {
    let recorder = Arc::new(build_recorder(&config.comparison).await?);
    let parser = build_parser(config, recorder.clone())?;

    let parsed = parser.parse_query(text).await;
    parser.shutdown().await;

    let shadow = parser.shadow_stats();
    tracing::info!(
        intent = %parsed.intent,
        confidence = parsed.confidence,
        shadow_completed = shadow.completed,
        shadow_failed = shadow.failed,
        shadow_dropped = shadow.dropped,
        "query parsed"
    );

    recorder.close().await.context("closing comparison logs")?;
    Ok(parsed)
}

/// Analyze the durable log and export the report next to it.
pub async fn report(config: &AppConfig, days: u32) -> anyhow::Result<AnalysisReport> {
    let analyzer = ComparisonAnalyzer::new(&config.comparison.log_path);
    let report = analyzer
        .export_report(days, &config.comparison.report_path)
        .await
        .with_context(|| format!("analyzing {}", config.comparison.log_path.display()))?;
    Ok(report)
}

/// Summarize every record in the daily directory.
pub async fn shadow_summary(config: &AppConfig) -> anyhow::Result<ShadowSummary> {
    let dir = config
        .comparison
        .daily_dir
        .as_ref()
        .context("comparison.daily_dir is not configured")?;
    let records = DailyLogger::load_all(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    Ok(ShadowSummary::from_records(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_protocol::Intent;
    use std::path::PathBuf;

    fn temp_config() -> (AppConfig, PathBuf) {
        let root = std::env::temp_dir().join(format!("aq-agent-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let mut config = AppConfig::default();
        config.comparison.log_path = root.join("comparisons.log");
        config.comparison.report_path = root.join("report.json");
        config.comparison.daily_dir = Some(root.join("daily"));
        // Nothing listens here; the model tier fails fast and is recorded as unknown.
        config.llm.endpoint = "http://127.0.0.1:9/inference".into();
        config.llm.timeout_secs = 1;
        (config, root)
    }

    #[tokio::test]
    async fn parse_once_records_a_comparison() {
        let (config, root) = temp_config();
        let parsed = parse_once(&config, "What is PM2.5 in Delhi?").await.unwrap();
        assert_eq!(parsed.intent, Intent::CurrentReading);
        assert_eq!(parsed.confidence, 0.95);

        let records = aq_comparison::read_records(&config.comparison.log_path).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].llm_result.intent, Intent::Unknown);

        let summary = shadow_summary(&config).await.unwrap();
        assert_eq!(summary.total_queries, 1);
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn report_without_comparisons_fails() {
        let (config, root) = temp_config();
        assert!(report(&config, 7).await.is_err());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn shadow_summary_needs_a_directory() {
        let mut config = AppConfig::default();
        config.comparison.daily_dir = None;
        let err = shadow_summary(&config).await.unwrap_err();
        assert!(err.to_string().contains("daily_dir"));
    }
}
