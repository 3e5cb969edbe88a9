//! Offline analysis of the durable comparison log.
//!
//! Focuses on the cases where the model beat the pattern parser and
//! turns them into counters, examples, and recommendations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aq_protocol::{ComparisonRecord, Intent};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::durable::read_records_since;
use crate::error::{ComparisonError, ComparisonResult};

/// Examples kept per breakdown.
const MAX_EXAMPLES: usize = 5;
const LOW_CONFIDENCE: f64 = 0.5;
const COMPLEX_WORD_COUNT: usize = 8;

const COMPARISON_WORDS: &[&str] = &["compare", "vs", "versus", "better", "worse"];
const TEMPORAL_WORDS: &[&str] = &["trend", "history", "past", "change", "over time"];
const INTERROGATIVES: &[&str] = &["what", "show", "get", "tell"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_comparisons: usize,
    pub llm_better_count: usize,
    /// Percentage in [0, 100].
    pub llm_advantage_rate: f64,
    pub analysis_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementType {
    UnknownToSpecific,
    BasicToAdvanced,
    IntentCorrection,
}

impl ImprovementType {
    pub fn classify(regex: Intent, llm: Intent) -> Self {
        match (regex, llm) {
            (Intent::Unknown, llm) if llm != Intent::Unknown => Self::UnknownToSpecific,
            (Intent::CurrentReading, Intent::Trend | Intent::Comparison | Intent::Forecast) => {
                Self::BasicToAdvanced
            }
            _ => Self::IntentCorrection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentExample {
    pub query: String,
    pub regex_intent: Intent,
    pub llm_intent: Intent,
    pub improvement_type: ImprovementType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentAdvantages {
    pub total_intent_improvements: usize,
    pub improvement_types: BTreeMap<ImprovementType, usize>,
    pub examples: Vec<IntentExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityExample {
    pub query: String,
    pub regex_entities: Vec<String>,
    pub llm_entities: Vec<String>,
    pub llm_only_entities: Vec<String>,
    pub improvement_score: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAdvantages {
    pub total_entity_improvements: usize,
    pub avg_additional_entities: f64,
    /// Ranked by number of model-only entities, highest first.
    pub examples: Vec<EntityExample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidencePatterns {
    pub avg_regex_confidence: f64,
    pub avg_llm_confidence: f64,
    pub avg_confidence_gap: f64,
    pub low_regex_confidence_cases: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryPatterns {
    pub complex_queries: usize,
    pub comparison_queries: usize,
    pub temporal_queries: usize,
    pub implicit_queries: usize,
    pub numeric_queries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmAdvantages {
    pub intent_detection: IntentAdvantages,
    pub entity_extraction: EntityAdvantages,
    pub confidence_patterns: ConfidencePatterns,
    pub query_patterns: QueryPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportInfo {
    pub generated_at: DateTime<Utc>,
    pub days_analyzed: u32,
    pub comparisons_loaded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: ReportSummary,
    pub llm_advantages: LlmAdvantages,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_info: Option<ReportInfo>,
}

/// Reads a durable comparison log and reports on it.
pub struct ComparisonAnalyzer {
    log_path: PathBuf,
}

impl ComparisonAnalyzer {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Records from the last `days_back` days. A missing log yields none.
    pub async fn load_comparisons(&self, days_back: u32) -> ComparisonResult<Vec<ComparisonRecord>> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_back));
        match read_records_since(&self.log_path, cutoff).await {
            Ok(records) => Ok(records),
            Err(ComparisonError::NotFound(path)) => {
                tracing::warn!(%path, "comparison log not found");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Analyze a batch of records. Fails with `NoComparisons` when empty.
    pub fn analyze(&self, comparisons: &[ComparisonRecord]) -> ComparisonResult<AnalysisReport> {
        if comparisons.is_empty() {
            return Err(ComparisonError::NoComparisons);
        }
        let better: Vec<&ComparisonRecord> = comparisons.iter().filter(|r| r.llm_better).collect();

        Ok(AnalysisReport {
            summary: ReportSummary {
                total_comparisons: comparisons.len(),
                llm_better_count: better.len(),
                llm_advantage_rate: better.len() as f64 / comparisons.len() as f64 * 100.0,
                analysis_date: Utc::now(),
            },
            llm_advantages: LlmAdvantages {
                intent_detection: intent_advantages(&better),
                entity_extraction: entity_advantages(&better),
                confidence_patterns: confidence_patterns(&better),
                query_patterns: query_patterns(&better),
            },
            recommendations: recommendations(&better),
            report_info: None,
        })
    }

    /// Load the last `days_back` days and analyze them.
    pub async fn generate_report(&self, days_back: u32) -> ComparisonResult<AnalysisReport> {
        let comparisons = self.load_comparisons(days_back).await?;
        let mut report = self.analyze(&comparisons)?;
        report.report_info = Some(ReportInfo {
            generated_at: Utc::now(),
            days_analyzed: days_back,
            comparisons_loaded: comparisons.len(),
        });
        tracing::info!(
            days_back,
            comparisons = comparisons.len(),
            llm_better = report.summary.llm_better_count,
            "comparison report generated"
        );
        Ok(report)
    }

    /// Generate a report and write it as pretty JSON to `output`.
    pub async fn export_report(
        &self,
        days_back: u32,
        output: impl AsRef<Path>,
    ) -> ComparisonResult<AnalysisReport> {
        let report = self.generate_report(days_back).await?;
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(output.as_ref(), json).await?;
        tracing::info!(path = %output.as_ref().display(), "comparison report exported");
        Ok(report)
    }
}

fn intent_advantages(better: &[&ComparisonRecord]) -> IntentAdvantages {
    let improvements: Vec<IntentExample> = better
        .iter()
        .filter_map(|r| {
            let diff = r.differences.intent.as_ref()?;
            Some(IntentExample {
                query: r.query.clone(),
                regex_intent: diff.regex,
                llm_intent: diff.llm,
                improvement_type: ImprovementType::classify(diff.regex, diff.llm),
            })
        })
        .collect();

    let mut improvement_types = BTreeMap::new();
    for example in &improvements {
        *improvement_types.entry(example.improvement_type).or_insert(0) += 1;
    }

    IntentAdvantages {
        total_intent_improvements: improvements.len(),
        improvement_types,
        examples: improvements.into_iter().take(MAX_EXAMPLES).collect(),
    }
}

fn entity_advantages(better: &[&ComparisonRecord]) -> EntityAdvantages {
    let mut improvements: Vec<EntityExample> = better
        .iter()
        .filter_map(|r| {
            let diff = r.differences.entities.as_ref()?;
            Some(EntityExample {
                query: r.query.clone(),
                regex_entities: r.regex_result.entities.keys().cloned().collect(),
                llm_entities: r.llm_result.entities.keys().cloned().collect(),
                llm_only_entities: diff.llm_only.clone(),
                improvement_score: diff.llm_only.len(),
            })
        })
        .collect();

    let total = improvements.len();
    let score_sum: usize = improvements.iter().map(|e| e.improvement_score).sum();
    // Stable sort: ties keep log order.
    improvements.sort_by(|a, b| b.improvement_score.cmp(&a.improvement_score));
    improvements.truncate(MAX_EXAMPLES);

    EntityAdvantages {
        total_entity_improvements: total,
        avg_additional_entities: score_sum as f64 / total.max(1) as f64,
        examples: improvements,
    }
}

fn confidence_patterns(better: &[&ComparisonRecord]) -> ConfidencePatterns {
    if better.is_empty() {
        return ConfidencePatterns::default();
    }
    let n = better.len() as f64;
    let regex_sum: f64 = better.iter().map(|r| r.regex_result.confidence).sum();
    let llm_sum: f64 = better.iter().map(|r| r.llm_result.confidence).sum();

    ConfidencePatterns {
        avg_regex_confidence: regex_sum / n,
        avg_llm_confidence: llm_sum / n,
        avg_confidence_gap: (llm_sum - regex_sum) / n,
        low_regex_confidence_cases: better
            .iter()
            .filter(|r| r.regex_result.confidence < LOW_CONFIDENCE)
            .count(),
    }
}

fn is_complex(query: &str) -> bool {
    query.split_whitespace().count() > COMPLEX_WORD_COUNT
}

fn query_patterns(better: &[&ComparisonRecord]) -> QueryPatterns {
    let mut patterns = QueryPatterns::default();
    for record in better {
        let query = record.query.to_lowercase();
        if query.contains("complex") || is_complex(&query) {
            patterns.complex_queries += 1;
        }
        if COMPARISON_WORDS.iter().any(|w| query.contains(w)) {
            patterns.comparison_queries += 1;
        }
        if TEMPORAL_WORDS.iter().any(|w| query.contains(w)) {
            patterns.temporal_queries += 1;
        }
        if !query.contains('?') && !INTERROGATIVES.iter().any(|w| query.starts_with(w)) {
            patterns.implicit_queries += 1;
        }
        if query.chars().any(|c| c.is_ascii_digit()) {
            patterns.numeric_queries += 1;
        }
    }
    patterns
}

fn recommendations(better: &[&ComparisonRecord]) -> Vec<String> {
    if better.is_empty() {
        return vec!["Regex parser performing well. Consider maintaining current approach.".into()];
    }

    let total = better.len() as f64;
    let share = |count: usize| count as f64 / total;
    let mut out = Vec::new();

    let intent_cases = better.iter().filter(|r| r.differences.intent.is_some()).count();
    if share(intent_cases) > 0.3 {
        out.push("Consider improving regex patterns for intent detection".into());
    }

    let entity_cases = better.iter().filter(|r| r.differences.entities.is_some()).count();
    if share(entity_cases) > 0.3 {
        out.push("LLM shows significant advantage in entity extraction".into());
    }

    let low_confidence = better
        .iter()
        .filter(|r| r.regex_result.confidence < LOW_CONFIDENCE)
        .count();
    if share(low_confidence) > 0.5 {
        out.push("Consider using LLM for queries with low regex confidence (<0.5)".into());
    }

    let complex = better.iter().filter(|r| is_complex(&r.query)).count();
    if share(complex) > 0.3 {
        out.push("LLM handles complex queries better - consider length-based routing".into());
    }

    out
}
