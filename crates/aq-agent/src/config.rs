//! Agent configuration, loadable from TOML with environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use aq_comparison::DEFAULT_BUFFER_CAPACITY;
use aq_parser::{HybridConfig, LlmConfig, ParseMode};
use serde::Deserialize;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub parser: HybridConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
}

/// Where comparisons are written and how many are kept in memory.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    /// Durable append-only log read back by the analyzer.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Per-day JSONL directory. None disables the daily logger.
    #[serde(default)]
    pub daily_dir: Option<PathBuf>,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Prefix each durable entry with `[parse_comparison] `.
    #[serde(default = "default_framing")]
    pub framing: bool,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("parsing_comparisons.log")
}
fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}
fn default_framing() -> bool {
    true
}
fn default_report_path() -> PathBuf {
    PathBuf::from("parsing_analysis_report.json")
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            daily_dir: None,
            buffer_capacity: default_buffer_capacity(),
            framing: default_framing(),
            report_path: default_report_path(),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// File (or defaults when no path is given), then process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `AQ_PARSER_MODE`, `AQ_LLM_ENDPOINT` and `AQ_COMPARISON_LOG`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(mode) = lookup("AQ_PARSER_MODE") {
            self.parser.mode = mode
                .parse::<ParseMode>()
                .map_err(|e| anyhow::anyhow!("AQ_PARSER_MODE: {e}"))?;
        }
        if let Some(endpoint) = lookup("AQ_LLM_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            self.llm.endpoint = endpoint;
        }
        if let Some(path) = lookup("AQ_COMPARISON_LOG").filter(|v| !v.trim().is_empty()) {
            self.comparison.log_path = PathBuf::from(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_parser::Transport;
    use std::collections::HashMap;

    #[test]
    fn empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.parser.mode, ParseMode::Shadow);
        assert_eq!(config.parser.confidence_threshold, 0.85);
        assert_eq!(config.parser.production_timeout_secs, 5);
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.max_tokens, 150);
        assert!(config.llm.enabled);
        assert_eq!(config.comparison.log_path, PathBuf::from("parsing_comparisons.log"));
        assert_eq!(config.comparison.buffer_capacity, 100);
        assert!(config.comparison.framing);
        assert!(config.comparison.daily_dir.is_none());
    }

    #[test]
    fn deserialize_full_config() {
        let toml = r#"
[parser]
mode = "production"
confidence_threshold = 0.9
shadow_queue_capacity = 32

[llm]
endpoint = "http://10.0.0.5:11434/api/chat"
transport = "chat"
model = "granite-aq"
temperature = 0.0
enabled = false

[comparison]
log_path = "/var/log/aq/comparisons.log"
daily_dir = "/var/log/aq/daily"
buffer_capacity = 500
framing = false
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.parser.mode, ParseMode::Production);
        assert_eq!(config.parser.confidence_threshold, 0.9);
        assert_eq!(config.parser.shadow_queue_capacity, 32);
        assert_eq!(config.llm.transport, Transport::Chat);
        assert_eq!(config.llm.model, "granite-aq");
        assert!(!config.llm.enabled);
        assert_eq!(config.comparison.daily_dir.as_deref(), Some(std::path::Path::new("/var/log/aq/daily")));
        assert_eq!(config.comparison.buffer_capacity, 500);
        assert!(!config.comparison.framing);
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AQ_PARSER_MODE", "Production"),
            ("AQ_LLM_ENDPOINT", "http://model:8000/inference"),
            ("AQ_COMPARISON_LOG", "/tmp/cmp.log"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.parser.mode, ParseMode::Production);
        assert_eq!(config.llm.endpoint, "http://model:8000/inference");
        assert_eq!(config.comparison.log_path, PathBuf::from("/tmp/cmp.log"));
    }

    #[test]
    fn bad_mode_override_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|k| (k == "AQ_PARSER_MODE").then(|| "canary".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("unknown parser mode"));
    }

    #[test]
    fn from_file_reads_toml() {
        let path = std::env::temp_dir().join(format!("aq-agent-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[parser]\nmode = \"production\"\n").unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.parser.mode, ParseMode::Production);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = AppConfig::from_file("/nonexistent/aq.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/aq.toml"));
    }
}
