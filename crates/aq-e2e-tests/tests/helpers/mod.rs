//! Shared test harness for E2E integration tests.
//!
//! Wires the hybrid parser to a wiremock inference service and a recorder
//! writing into a per-test temp directory, so every test exercises the
//! real parser → recorder → log → analyzer path.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aq_comparison::{ComparisonRecorder, DailyLogger, DurableLog};
use aq_parser::{HybridConfig, HybridParser, LlmConfig, LlmParser, ParseMode, PatternParser, QueryParser, Transport};

/// One isolated parser/recorder stack.
pub struct TestHarness {
    /// Temp directory holding the durable log and daily files.
    pub root: PathBuf,
    /// Mock inference service.
    pub server: MockServer,
    pub recorder: Arc<ComparisonRecorder>,
}

impl TestHarness {
    /// Fresh temp dir, mock server, and a recorder with both log writers.
    pub async fn start() -> Self {
        let root = std::env::temp_dir().join(format!("aq-e2e-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();

        let log = DurableLog::open(root.join("comparisons.log"), true).await.unwrap();
        let daily = DailyLogger::open(root.join("daily")).await.unwrap();
        let recorder = ComparisonRecorder::new(100)
            .with_durable_log(log)
            .with_daily_logger(daily);

        Self {
            root,
            server: MockServer::start().await,
            recorder: Arc::new(recorder),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("comparisons.log")
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("daily")
    }

    /// Answer `query` with a wrapped model payload.
    pub async fn mount_model_reply(&self, query: &str, payload: Value) {
        Mock::given(method("GET"))
            .and(path("/inference"))
            .and(query_param("query", format!("\"{query}\"")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": payload.to_string()})))
            .mount(&self.server)
            .await;
    }

    pub fn model(&self) -> Arc<dyn QueryParser> {
        Arc::new(
            LlmParser::new(LlmConfig {
                endpoint: format!("{}/inference", self.server.uri()),
                transport: Transport::Get,
                timeout_secs: 2,
                ..LlmConfig::default()
            })
            .unwrap(),
        )
    }

    pub fn hybrid(&self, mode: ParseMode) -> HybridParser {
        HybridParser::new(
            PatternParser::new(),
            self.model(),
            self.recorder.clone(),
            HybridConfig {
                mode,
                ..HybridConfig::default()
            },
        )
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
