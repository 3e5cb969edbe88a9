//! E2E tests for the agent's config → parse → report path.

mod helpers;

use clap::Parser;
use serde_json::json;

use aq_agent::cli::{Cli, Command};
use aq_agent::config::AppConfig;
use aq_agent::runtime;
use aq_protocol::Intent;
use helpers::TestHarness;

const QUERY: &str = "is it smoggy around hauz khas today";

fn write_config(h: &TestHarness) -> std::path::PathBuf {
    let toml = format!(
        r#"
[parser]
mode = "shadow"

[llm]
endpoint = "{uri}/inference"
timeout_secs = 2

[comparison]
log_path = "{log}"
daily_dir = "{daily}"
report_path = "{report}"
"#,
        uri = h.server.uri(),
        log = h.root.join("agent.log").display(),
        daily = h.root.join("agent-daily").display(),
        report = h.root.join("agent-report.json").display(),
    );
    let path = h.root.join("agent.toml");
    std::fs::write(&path, toml).unwrap();
    path
}

#[tokio::test]
async fn e2e_agent_parse_then_report() {
    let h = TestHarness::start().await;
    h.mount_model_reply(
        QUERY,
        json!({
            "intent": "current_reading",
            "entities": {"location": "hauz khas", "metric": "pm25"},
            "confidence": 0.85
        }),
    )
    .await;

    let config_path = write_config(&h);
    let cli = Cli::try_parse_from([
        "aq-agent",
        "--config",
        config_path.to_str().unwrap(),
        "parse",
        QUERY,
    ])
    .unwrap();
    assert_eq!(cli.command, Command::Parse { text: vec![QUERY.to_string()] });
    let config = AppConfig::from_file(cli.config.as_deref().unwrap()).unwrap();

    let parsed = runtime::parse_once(&config, QUERY).await.unwrap();
    assert_eq!(parsed.intent, Intent::Unknown);

    let report = runtime::report(&config, 7).await.unwrap();
    assert_eq!(report.summary.total_comparisons, 1);
    assert_eq!(report.summary.llm_better_count, 1);
    assert!(h.root.join("agent-report.json").exists());

    let summary = runtime::shadow_summary(&config).await.unwrap();
    assert_eq!(summary.total_queries, 1);
    assert_eq!(summary.regex_failures_recovered, 1);
}
