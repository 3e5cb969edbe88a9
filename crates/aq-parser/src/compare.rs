//! Differences between the two parsers' results, and the `llm_better` verdict.
//!
//! The verdict is a proxy signal for offline analysis only; it never
//! influences which result is returned.

use aq_protocol::{ComparisonRecord, Differences, EntityDiff, Intent, IntentDiff, ParsedQuery};
use chrono::Utc;

/// Confidence gaps at or below this are not recorded and do not count.
const CONFIDENCE_MARGIN: f64 = 0.1;
/// Below this the pattern parser is considered unsure of its entities.
const LOW_REGEX_CONFIDENCE: f64 = 0.7;

pub fn compute_differences(regex: &ParsedQuery, llm: &ParsedQuery) -> Differences {
    let intent = (regex.intent != llm.intent).then(|| IntentDiff {
        regex: regex.intent,
        llm: llm.intent,
    });

    let regex_only: Vec<String> = regex
        .entities
        .keys()
        .filter(|k| !llm.entities.contains_key(*k))
        .cloned()
        .collect();
    let llm_only: Vec<String> = llm
        .entities
        .keys()
        .filter(|k| !regex.entities.contains_key(*k))
        .cloned()
        .collect();
    let entities = (!regex_only.is_empty() || !llm_only.is_empty()).then(|| EntityDiff {
        common: regex
            .entities
            .keys()
            .filter(|k| llm.entities.contains_key(*k))
            .cloned()
            .collect(),
        regex_only,
        llm_only,
    });

    let gap = llm.confidence - regex.confidence;
    let confidence_diff = (gap.abs() > CONFIDENCE_MARGIN).then_some(gap);

    Differences {
        intent,
        entities,
        confidence_diff,
    }
}

pub fn is_llm_better(regex: &ParsedQuery, llm: &ParsedQuery) -> bool {
    llm.confidence > regex.confidence + CONFIDENCE_MARGIN
        || (regex.confidence < LOW_REGEX_CONFIDENCE && llm.entity_count() > regex.entity_count())
        || (regex.intent == Intent::Unknown && llm.intent != Intent::Unknown)
}

/// Snapshot both results for the recorder.
pub fn build_record(query: &str, regex: &ParsedQuery, llm: &ParsedQuery) -> ComparisonRecord {
    ComparisonRecord {
        timestamp: Utc::now(),
        query: query.to_string(),
        regex_result: regex.into(),
        llm_result: llm.into(),
        differences: compute_differences(regex, llm),
        llm_better: is_llm_better(regex, llm),
    }
}
