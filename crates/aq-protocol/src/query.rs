use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered parameter map extracted from a query (insertion order is kept).
pub type Entities = serde_json::Map<String, Value>;

/// Closed set of things a user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Intent {
    CurrentReading,
    Trend,
    Comparison,
    Forecast,
    Hotspot,
    /// Health alert / advisory questions ("is delhi safe?").
    Alert,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentReading => "current_reading",
            Self::Trend => "trend",
            Self::Comparison => "comparison",
            Self::Forecast => "forecast",
            Self::Hotspot => "hotspot",
            Self::Alert => "alert",
            Self::Unknown => "unknown",
        }
    }

    /// Map a free-form label (as produced by a model) onto an intent.
    ///
    /// Unrecognised labels become `Unknown` rather than an error.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "current_reading" | "current" | "current_value" => Self::CurrentReading,
            "trend" | "time_series" | "history" => Self::Trend,
            "comparison" | "compare" => Self::Comparison,
            "forecast" | "prediction" => Self::Forecast,
            "hotspot" | "hotspots" => Self::Hotspot,
            "alert" | "health" | "advisory" | "health_advisory" => Self::Alert,
            _ => Self::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<String> for Intent {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of interpreting one query. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    /// Self-assessed certainty in [0.0, 1.0].
    pub confidence: f64,
    #[serde(default)]
    pub raw_query: String,
}

impl ParsedQuery {
    pub fn new(intent: Intent, entities: Entities, confidence: f64, raw_query: impl Into<String>) -> Self {
        Self {
            intent,
            entities,
            confidence: confidence.clamp(0.0, 1.0),
            raw_query: raw_query.into(),
        }
    }

    /// The "nothing matched" result: `unknown`, 0.0, `{query: text}`.
    pub fn unknown(text: &str) -> Self {
        let mut entities = Entities::new();
        entities.insert("query".into(), Value::String(text.to_string()));
        Self::new(Intent::Unknown, entities, 0.0, text)
    }

    /// Downgraded result for a failed parse, carrying the failure message.
    pub fn failed(text: &str, error: impl std::fmt::Display) -> Self {
        let mut parsed = Self::unknown(text);
        parsed
            .entities
            .insert("error".into(), Value::String(error.to_string()));
        parsed
    }

    /// String entity, if present and non-empty after trimming.
    pub fn entity_str(&self, key: &str) -> Option<&str> {
        self.entities
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
