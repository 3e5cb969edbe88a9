//! aq-agent: parse air-quality questions and review parser comparisons.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aq_agent::cli::{Cli, Command};
use aq_agent::config::AppConfig;
use aq_agent::runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.parser.mode,
        llm_endpoint = %config.llm.endpoint,
        comparison_log = %config.comparison.log_path.display(),
        "aq-agent starting"
    );

    match cli.command {
        Command::Parse { text } => {
            let parsed = runtime::parse_once(&config, &text.join(" ")).await?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Command::Report { days } => {
            let report = runtime::report(&config, days).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            tracing::info!(path = %config.comparison.report_path.display(), "report exported");
        }
        Command::ShadowSummary => {
            let summary = runtime::shadow_summary(&config).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
