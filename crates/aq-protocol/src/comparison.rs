use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::{Entities, Intent, ParsedQuery};

/// One parser's view of a query, as stored in a comparison record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseSnapshot {
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub confidence: f64,
}

impl From<&ParsedQuery> for ParseSnapshot {
    fn from(parsed: &ParsedQuery) -> Self {
        Self {
            intent: parsed.intent,
            entities: parsed.entities.clone(),
            confidence: parsed.confidence,
        }
    }
}

/// Both intents, recorded when they disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDiff {
    pub regex: Intent,
    pub llm: Intent,
}

/// Entity key-set split, recorded when the key sets differ.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDiff {
    #[serde(default)]
    pub regex_only: Vec<String>,
    #[serde(default)]
    pub llm_only: Vec<String>,
    #[serde(default)]
    pub common: Vec<String>,
}

/// Where the two parsers disagree. Absent fields mean agreement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Differences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityDiff>,
    /// `llm.confidence - regex.confidence`, only when the gap exceeds 0.1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_diff: Option<f64>,
}

impl Differences {
    pub fn is_empty(&self) -> bool {
        self.intent.is_none() && self.entities.is_none() && self.confidence_diff.is_none()
    }
}

/// Snapshot comparing both parsers' outputs for one query. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    #[serde(deserialize_with = "crate::time::deserialize_flexible")]
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub regex_result: ParseSnapshot,
    pub llm_result: ParseSnapshot,
    #[serde(default)]
    pub differences: Differences,
    #[serde(default)]
    pub llm_better: bool,
}

impl ComparisonRecord {
    /// Number of entity keys only the model produced.
    pub fn llm_only_entity_count(&self) -> usize {
        self.differences
            .entities
            .as_ref()
            .map(|diff| diff.llm_only.len())
            .unwrap_or(0)
    }
}
