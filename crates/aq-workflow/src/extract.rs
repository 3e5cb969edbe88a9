//! Location term extraction: a fixed-priority fallback chain.
//!
//! Strategies, first non-empty wins:
//! 1. text after the last occurrence of the first matching preposition
//! 2. variant-specific keyword patterns (first capture group)
//! 3. leading tokens when the query ends in metric/forecast keywords
//! 4. whatever survives stop-word and metric-word removal

use std::sync::LazyLock;

use regex::Regex;

const PREPOSITIONS: [&str; 6] = [" in ", " at ", " for ", " of ", " near ", " around "];

/// A query opening with one of these is a question, not "<place> <metric>".
const LEADING_VERBS: [&str; 8] = ["what", "what's", "whats", "show", "tell", "get", "find", "how"];

const STOP_WORDS: [&str; 26] = [
    "what", "is", "the", "show", "me", "tell", "get", "find", "current", "latest", "now", "today",
    "level", "levels", "reading", "value", "please", "can", "you", "will", "be", "forecast",
    "prediction", "tomorrow", "future", "next",
];

const METRIC_WORDS: [&str; 7] = ["pm2.5", "pm25", "pm", "aqi", "air", "quality", "pollution"];

/// One variant's extraction strategy set.
pub struct ExtractionChain {
    name: &'static str,
    patterns: Vec<Regex>,
    trailing: Regex,
    tail_keywords: &'static [&'static str],
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid built-in pattern")
}

static CURRENT_READING: LazyLock<ExtractionChain> = LazyLock::new(|| ExtractionChain {
    name: "current_reading",
    patterns: vec![
        compile(
            r"(?:current|latest|live|today'?s?)\s+(?:pm2\.5|pm25|pm|aqi|air quality)\s+(?:(?:level|levels|reading|value)\s+)?(?:(?:in|at|for|of)\s+)?(.+)",
        ),
        compile(
            r"(?:pm2\.5|pm25|pm|aqi|air quality)\s+(?:level|levels|reading|value|now|today)\s+(?:(?:in|at|for|of)\s+)?(.+)",
        ),
        compile(
            r"(?:how is|how's|hows)\s+(?:the\s+)?(?:pm2\.5|pm25|pm|aqi|air quality|air)\s+(?:(?:like|today|now)\s+)?(?:(?:in|at|for|of)\s+)?(.+)",
        ),
    ],
    trailing: compile(
        r"(?:^|\s+)(?:right now|now|currently|today|level|levels|reading|please|next \d+ days?|week|days?|for|in|at)$",
    ),
    tail_keywords: &["pm2.5", "pm25", "pm", "aqi", "quality", "level", "levels", "reading", "now", "today"],
});

static FORECAST: LazyLock<ExtractionChain> = LazyLock::new(|| ExtractionChain {
    name: "forecast",
    patterns: vec![
        compile(
            r"(?:forecast|predicted?|tomorrow|future)\s+(?:pm2\.5|pm25|pm|aqi|air quality)\s+(?:(?:in|at|for|of)\s+)?(.+)",
        ),
        compile(r"(?:pm2\.5|pm25|pm|aqi)\s+(?:forecast|prediction|tomorrow)\s+(?:(?:in|at|for)\s+)?(.+)"),
        compile(r"(?:what will be|what's the|whats the)\s+(?:pm2\.5|pm25|pm|aqi)\s+(?:(?:in|at|for)\s+)?(.+)"),
    ],
    trailing: compile(
        r"(?:^|\s+)(?:tomorrow|today|next \d+ days?|(?:this |next )?week|\d+ days?|days?|forecast|prediction|for|in|at|over)$",
    ),
    tail_keywords: &["forecast", "tomorrow", "prediction", "future"],
});

/// Lower-case, drop `?`, `!`, `.` and squeeze whitespace.
pub fn clean(query: &str) -> String {
    query
        .to_lowercase()
        .replace(['?', '!', '.'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl ExtractionChain {
    pub fn current_reading() -> &'static Self {
        &CURRENT_READING
    }

    pub fn forecast() -> &'static Self {
        &FORECAST
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Remove trailing time/qualifier words until none remain.
    pub fn strip_trailing(&self, text: &str) -> String {
        let mut current = text.trim().to_string();
        loop {
            let next = self.trailing.replace(&current, "").trim().to_string();
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Run the chain. `None` means no strategy produced a term.
    pub fn extract(&self, query: &str) -> Option<String> {
        let q = clean(query);
        if q.is_empty() {
            return None;
        }

        for prep in PREPOSITIONS {
            if let Some(pos) = q.rfind(prep) {
                let candidate = self.strip_trailing(&q[pos + prep.len()..]);
                if candidate.chars().count() > 1 {
                    tracing::debug!(chain = self.name, strategy = "preposition", preposition = prep.trim(), term = %candidate, "location extracted");
                    return Some(candidate);
                }
            }
        }

        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(&q)
                && let Some(m) = caps.get(1)
            {
                let candidate = self.strip_trailing(m.as_str());
                if candidate.chars().count() > 1 {
                    tracing::debug!(chain = self.name, strategy = "pattern", term = %candidate, "location extracted");
                    return Some(candidate);
                }
            }
        }

        let words: Vec<&str> = q.split_whitespace().collect();

        if let Some(candidate) = self.leading_tokens(&q, &words) {
            tracing::debug!(chain = self.name, strategy = "leading_tokens", term = %candidate, "location extracted");
            return Some(candidate);
        }

        let remaining: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| !STOP_WORDS.contains(w) && w.chars().count() > 2)
            .filter(|w| !METRIC_WORDS.contains(w))
            .collect();
        if remaining.is_empty() {
            tracing::debug!(chain = self.name, query = %q, "no location found");
            return None;
        }
        let candidate = remaining.join(" ");
        tracing::debug!(chain = self.name, strategy = "word_filter", term = %candidate, "location extracted");
        Some(candidate)
    }

    /// "<place> pm2.5 forecast": everything before the trailing keywords.
    fn leading_tokens(&self, q: &str, words: &[&str]) -> Option<String> {
        let prefix: String = q.chars().take(20).collect();
        if prefix.split_whitespace().any(|w| LEADING_VERBS.contains(&w)) || words.len() < 2 {
            return None;
        }
        if !words[words.len() - 2..]
            .iter()
            .any(|w| self.tail_keywords.contains(w))
        {
            return None;
        }

        let mut end = words.len();
        while end > 0
            && (self.tail_keywords.contains(&words[end - 1]) || METRIC_WORDS.contains(&words[end - 1]))
        {
            end -= 1;
        }
        let candidate = self.strip_trailing(&words[..end].join(" "));
        (!candidate.is_empty()).then_some(candidate)
    }
}
