//! Pattern parser: ordered regex rule table with table-driven confidence.
//!
//! Intents are tried in declaration order and, within an intent, rules in
//! list order. The first rule that matches wins; there is no best-match
//! search across intents.

use std::sync::LazyLock;

use async_trait::async_trait;
use aq_protocol::{Entities, Intent, ParsedQuery};
use regex::{Captures, Regex};
use serde_json::{Value, json};

use crate::QueryParser;

/// Metric synonyms, scanned in this order when looking for a metric
/// anywhere in the text.
const METRIC_SYNONYMS: &[(&str, &str)] = &[
    ("pm", "pm25"),
    ("pm2.5", "pm25"),
    ("pm25", "pm25"),
    ("aqi", "aqi"),
    ("air quality", "aqi"),
    ("air quality index", "aqi"),
    ("no2", "no2"),
    ("nitrogen", "no2"),
    ("so2", "so2"),
    ("sulfur", "so2"),
    ("ozone", "o3"),
    ("o3", "o3"),
];

const UNIT_SYNONYMS: &[(&str, &str)] = &[
    ("hour", "hours"),
    ("hours", "hours"),
    ("hr", "hours"),
    ("hrs", "hours"),
    ("day", "days"),
    ("days", "days"),
    ("d", "days"),
    ("week", "weeks"),
    ("weeks", "weeks"),
    ("wk", "weeks"),
    ("wks", "weeks"),
    ("month", "months"),
    ("months", "months"),
    ("mo", "months"),
    ("year", "years"),
    ("years", "years"),
    ("yr", "years"),
    ("yrs", "years"),
];

const DEFAULT_METRIC: &str = "pm25";
const BASE_CONFIDENCE: f64 = 0.8;

/// One regex rule and the number of capture groups it declares.
struct Rule {
    regex: Regex,
    groups: usize,
}

/// All rules for one intent.
struct IntentRules {
    intent: Intent,
    rules: Vec<Rule>,
}

fn rule(pattern: &str, groups: usize) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("invalid built-in pattern"),
        groups,
    }
}

/// Declaration order is significant.
static RULE_TABLE: LazyLock<Vec<IntentRules>> = LazyLock::new(|| {
    vec![
        IntentRules {
            intent: Intent::CurrentReading,
            rules: vec![
                rule(
                    r"(?:what(?:'s| is)|show me|tell me) (?:the )?(?:current |latest |present )?(?P<metric>[\w.]+)(?: level| reading)? (?:in|at|for) (?P<location>[\w\s]+?)(?:\?|$)",
                    2,
                ),
                rule(r"(?P<metric>[\w.]+) in (?P<location>[\w\s]+?)(?:\?|$)", 2),
                rule(r"(?P<location>[\w\s]+?) (?P<metric>[\w.]+) level", 2),
            ],
        },
        IntentRules {
            intent: Intent::Trend,
            rules: vec![
                rule(
                    r"(?:show |display |get )?(?P<metric>[\w.]+) (?:trend|history|pattern) (?:for |in )?(?P<location>[\w\s]+?) (?:for |over )?(?:the )?(?:last|past) (?P<duration>\d+) (?P<unit>\w+)",
                    4,
                ),
                rule(
                    r"(?P<location>[\w\s]+?) (?P<metric>[\w.]+) (?:for |over )?(?:the )?(?:last|past) (?P<duration>\d+) (?P<unit>\w+)",
                    4,
                ),
                rule(
                    r"how (?:has |did )(?P<metric>[\w.]+) (?:changed?|varied) in (?P<location>[\w\s]+?) (?:over |in )?(?:the )?(?:last|past) (?P<duration>\d+) (?P<unit>\w+)",
                    4,
                ),
            ],
        },
        IntentRules {
            intent: Intent::Comparison,
            rules: vec![
                rule(
                    r"compare (?P<metric>[\w.]+) (?:between |in |across )(?P<loc1>[\w\s]+?) (?:and|with|vs) (?P<loc2>[\w\s]+)",
                    3,
                ),
                rule(
                    r"(?P<loc1>[\w\s]+?) vs\.? (?P<loc2>[\w\s]+?)(?: for)? (?P<metric>[\w.]+)",
                    3,
                ),
                rule(
                    r"which (?:is |has )(?:better|worse|higher|lower)(?: \w+)? (?P<loc1>[\w\s]+?) or (?P<loc2>[\w\s]+)",
                    2,
                ),
            ],
        },
        IntentRules {
            intent: Intent::Forecast,
            rules: vec![
                rule(
                    r"(?:what will|predict|forecast|expected) (?P<metric>[\w.]+) (?:be |in |for )?(?P<location>[\w\s]+?) (?:tomorrow|today|next (?P<duration>\d+) (?P<unit>\w+))",
                    4,
                ),
                rule(
                    r"(?P<location>[\w\s]+?) (?P<metric>[\w.]+) forecast(?: for)? (?:next |coming )?(?P<duration>\d+)? ?(?P<unit>\w+)?",
                    4,
                ),
                rule(
                    r"will (?P<metric>[\w.]+) (?:increase|decrease|improve|worsen) in (?P<location>[\w\s]+)",
                    2,
                ),
            ],
        },
        IntentRules {
            intent: Intent::Hotspot,
            rules: vec![
                rule(
                    r"(?:show |find |get )?(?:pollution |air quality )?hotspots?(?: (?:in |for |around )?(?P<location>[\w\s]+))?",
                    1,
                ),
                rule(
                    r"(?:most |least )polluted (?:areas?|locations?|places?)(?: (?:in |around )?(?P<location>[\w\s]+))?",
                    1,
                ),
                rule(
                    r"where (?:is |are )(?:the )?(?:worst|best) air quality(?: (?:in |around )?(?P<location>[\w\s]+))?",
                    1,
                ),
            ],
        },
        IntentRules {
            intent: Intent::Alert,
            rules: vec![
                rule(
                    r"(?:is |are )?(?P<location>[\w\s]+?) (?:safe|dangerous|hazardous|unhealthy)",
                    1,
                ),
                rule(
                    r"should i (?:go out|exercise|wear mask) in (?P<location>[\w\s]+)",
                    1,
                ),
                rule(
                    r"health (?:advisory|alert|warning) (?:for |in )?(?P<location>[\w\s]+)",
                    1,
                ),
            ],
        },
    ]
});

/// Normalize a metric token via the synonym table; unknown tokens pass through.
pub fn normalize_metric(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    METRIC_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == lower)
        .map(|(_, metric)| (*metric).to_string())
        .unwrap_or(lower)
}

pub fn normalize_unit(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    UNIT_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == lower)
        .map(|(_, unit)| (*unit).to_string())
        .unwrap_or(lower)
}

pub fn is_metric_synonym(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    METRIC_SYNONYMS.iter().any(|(synonym, _)| *synonym == lower)
}

/// First synonym (in table order) contained anywhere in the text.
pub fn scan_metric(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    METRIC_SYNONYMS
        .iter()
        .find(|(synonym, _)| lower.contains(synonym))
        .map(|(_, metric)| *metric)
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn location_value(caps: &Captures<'_>) -> Value {
    group(caps, "location").map_or(Value::Null, |s| json!(s))
}

fn extract_entities(intent: Intent, caps: &Captures<'_>, text: &str) -> Entities {
    let mut entities = Entities::new();

    match intent {
        Intent::CurrentReading => {
            if let (Some(metric), Some(location)) = (group(caps, "metric"), group(caps, "location")) {
                entities.insert("metric".into(), json!(normalize_metric(metric)));
                entities.insert("location".into(), json!(location));
            }
        }
        Intent::Trend => {
            let (mut metric, mut location) = (group(caps, "metric"), group(caps, "location"));
            if location.is_some_and(is_metric_synonym) && !metric.is_some_and(is_metric_synonym) {
                std::mem::swap(&mut metric, &mut location);
            }
            entities.insert(
                "metric".into(),
                json!(metric.map_or_else(|| DEFAULT_METRIC.to_string(), normalize_metric)),
            );
            if let Some(location) = location {
                entities.insert("location".into(), json!(location));
            }
            if let Some(duration) = group(caps, "duration").and_then(|d| d.parse::<u64>().ok()) {
                entities.insert("duration".into(), json!(duration));
            }
            if let Some(unit) = group(caps, "unit") {
                entities.insert("unit".into(), json!(normalize_unit(unit)));
            }
        }
        Intent::Comparison => {
            let locations: Vec<&str> = ["loc1", "loc2", "loc3"]
                .iter()
                .filter_map(|name| group(caps, name))
                .collect();
            entities.insert("locations".into(), json!(locations));
            let metric = scan_metric(text)
                .map(str::to_string)
                .or_else(|| group(caps, "metric").map(normalize_metric))
                .unwrap_or_else(|| DEFAULT_METRIC.to_string());
            entities.insert("metric".into(), json!(metric));
        }
        Intent::Forecast => {
            let metric = group(caps, "metric").map_or_else(|| DEFAULT_METRIC.to_string(), normalize_metric);
            entities.insert("metric".into(), json!(metric));
            entities.insert("location".into(), location_value(caps));
            match group(caps, "duration").and_then(|d| d.parse::<u64>().ok()) {
                Some(duration) => {
                    entities.insert("duration".into(), json!(duration));
                    let unit = group(caps, "unit").map_or_else(|| "hours".to_string(), normalize_unit);
                    entities.insert("unit".into(), json!(unit));
                }
                None => {
                    entities.insert("duration".into(), json!(24));
                    entities.insert("unit".into(), json!("hours"));
                }
            }
        }
        Intent::Hotspot | Intent::Alert => {
            entities.insert("location".into(), location_value(caps));
            entities.insert("metric".into(), json!(DEFAULT_METRIC));
        }
        Intent::Unknown => {}
    }

    entities
}

fn has_value(entities: &Entities, key: &str) -> bool {
    entities.get(key).is_some_and(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn score(intent: Intent, entities: &Entities) -> f64 {
    match intent {
        Intent::CurrentReading if has_value(entities, "location") && has_value(entities, "metric") => 0.95,
        Intent::Trend if ["location", "duration", "unit"].iter().all(|k| entities.contains_key(*k)) => 0.9,
        Intent::Comparison
            if entities
                .get("locations")
                .and_then(Value::as_array)
                .is_some_and(|l| l.len() >= 2) =>
        {
            0.9
        }
        _ => BASE_CONFIDENCE,
    }
}

/// Deterministic regex-table parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternParser;

impl PatternParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse synchronously. Unmatched text yields `ParsedQuery::unknown`.
    pub fn parse_text(&self, text: &str) -> ParsedQuery {
        let lower = text.trim().to_lowercase();

        for table in RULE_TABLE.iter() {
            for rule in &table.rules {
                if let Some(caps) = rule.regex.captures(&lower) {
                    let entities = extract_entities(table.intent, &caps, &lower);
                    let confidence = score(table.intent, &entities);
                    tracing::debug!(
                        intent = %table.intent,
                        confidence,
                        "pattern rule matched"
                    );
                    return ParsedQuery::new(table.intent, entities, confidence, text);
                }
            }
        }

        ParsedQuery::unknown(text)
    }
}

#[async_trait]
impl QueryParser for PatternParser {
    async fn parse(&self, text: &str) -> ParsedQuery {
        self.parse_text(text)
    }

    fn tier_name(&self) -> &str {
        "pattern"
    }
}
