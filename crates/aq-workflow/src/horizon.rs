//! Forecast horizon (days) from query text.

use std::sync::LazyLock;

use regex::Regex;

pub const MIN_FORECAST_DAYS: u32 = 1;
pub const MAX_FORECAST_DAYS: u32 = 7;

static DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"next (\d+) days?", r"(\d+)[ -]days?"]
        .into_iter()
        .map(|p| Regex::new(p).expect("invalid built-in pattern"))
        .collect()
});

/// Days to forecast, clamped to 1..=7; 1 when nothing matches.
///
/// Explicit numbers win over keywords ("tomorrow", "week", "three day").
pub fn forecast_days(query: &str) -> u32 {
    let q = query.to_lowercase();

    for pattern in DAY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&q)
            && let Some(days) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return days.clamp(MIN_FORECAST_DAYS, MAX_FORECAST_DAYS);
        }
    }

    if q.contains("tomorrow") {
        1
    } else if q.contains("week") {
        7
    } else if q.contains("three day") {
        3
    } else {
        MIN_FORECAST_DAYS
    }
}
