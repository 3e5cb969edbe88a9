//! Reply rendering: PM2.5 category, advisories, and chart payloads.

use aq_protocol::time::parse_timestamp;
use aq_protocol::{ChartSeries, DomainData, Location, SeriesPoint};
use chrono::{DateTime, Utc};

pub const FORECAST_CHART: &str = "forecast_time_series";
pub const READING_CHART: &str = "time_series";

/// PM2.5 (µg/m³) category bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
    Unknown,
}

impl AqiCategory {
    pub fn classify(value: Option<f64>) -> Self {
        match value {
            None => Self::Unknown,
            Some(v) if v <= 30.0 => Self::Good,
            Some(v) if v <= 60.0 => Self::Satisfactory,
            Some(v) if v <= 90.0 => Self::Moderate,
            Some(v) if v <= 120.0 => Self::Poor,
            Some(v) if v <= 250.0 => Self::VeryPoor,
            Some(_) => Self::Severe,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::Severe => "Severe",
            Self::Unknown => "Unknown",
        }
    }

    /// Advice for the poor end of the scale only.
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            Self::Poor => Some("Monitor air quality and limit outdoor exposure if needed."),
            Self::VeryPoor => Some(
                "Limit prolonged outdoor activities. Sensitive groups should consider staying indoors.",
            ),
            Self::Severe => Some(
                "Avoid all outdoor activities, keep windows closed, and consider using air purifiers.",
            ),
            _ => None,
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Points sorted by time; unparseable times sort after parseable ones.
pub fn chart(chart_type: &str, points: &[SeriesPoint]) -> Option<ChartSeries> {
    if points.is_empty() {
        return None;
    }
    let mut keyed: Vec<(Option<DateTime<Utc>>, &SeriesPoint)> =
        points.iter().map(|p| (parse_timestamp(&p.time), p)).collect();
    keyed.sort_by(|(ta, a), (tb, b)| match (ta, tb) {
        (Some(ta), Some(tb)) => ta.cmp(tb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.time.cmp(&b.time),
    });
    Some(ChartSeries {
        chart_type: chart_type.to_string(),
        points: keyed.into_iter().map(|(_, p)| p.clone()).collect(),
    })
}

pub fn render_current(location: &Location, data: &DomainData) -> (String, Option<ChartSeries>) {
    let category = AqiCategory::classify(data.value);
    let mut text = match data.value {
        Some(v) => format!(
            "The current PM2.5 level in {} is **{v:.1} µg/m³** ({category}).",
            location.display_label()
        ),
        None => format!(
            "No current PM2.5 reading is available for {}.",
            location.display_label()
        ),
    };

    if let Some(ts) = data.timestamp.as_deref() {
        match parse_timestamp(ts) {
            Some(at) => text.push_str(&format!("\nMeasured at {}.", at.format("%d %b %Y, %H:%M UTC"))),
            None => text.push_str(&format!("\nMeasured at {ts}.")),
        }
    }
    if let Some(stations) = data.station_count.filter(|n| *n > 0) {
        text.push_str(&format!("\nBased on {stations} monitoring stations."));
    }
    if let Some(advice) = category.advisory() {
        text.push_str(&format!("\n\n**Health Advisory**: {advice}"));
    }

    (text, chart(READING_CHART, &data.time_series))
}

pub fn render_forecast(
    location: &Location,
    data: &DomainData,
    days: u32,
) -> (String, Option<ChartSeries>) {
    let category = AqiCategory::classify(data.value);
    let mut text = format!("**PM2.5 Forecast for {}**\n\n", location.name);

    if let Some(v) = data.value {
        text.push_str(&format!("**Predicted Level:** {v:.1} µg/m³\n"));
        text.push_str(&format!("**Expected Air Quality:** {category}\n"));
    }

    let period = if days == 1 {
        "Next 24 hours".to_string()
    } else {
        format!("Next {days} days")
    };
    text.push_str(&format!("**Forecast Period:** {period}\n"));

    if let Some(sensors) = data.sensor_count.filter(|n| *n > 0) {
        text.push_str(&format!("**Data Sources:** {sensors} monitoring stations\n"));
    }
    if let Some(advice) = category.advisory() {
        text.push_str(&format!("\n**Health Advisory for Forecasted Period:** {advice}\n"));
    }

    let chart = chart(FORECAST_CHART, &data.time_series);
    if let Some(series) = &chart {
        text.push_str(&format!(
            "\n**Hourly forecast chart showing {} data points**",
            series.points.len()
        ));
    }

    (text, chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_breakpoints_are_inclusive() {
        assert_eq!(AqiCategory::classify(Some(30.0)), AqiCategory::Good);
        assert_eq!(AqiCategory::classify(Some(30.01)), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::classify(Some(60.0)), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::classify(Some(90.0)), AqiCategory::Moderate);
        assert_eq!(AqiCategory::classify(Some(120.0)), AqiCategory::Poor);
        assert_eq!(AqiCategory::classify(Some(250.0)), AqiCategory::VeryPoor);
        assert_eq!(AqiCategory::classify(Some(250.5)), AqiCategory::Severe);
        assert_eq!(AqiCategory::classify(None), AqiCategory::Unknown);
    }

    #[test]
    fn advisories_only_for_poor_and_worse() {
        assert!(AqiCategory::Moderate.advisory().is_none());
        assert!(AqiCategory::Poor.advisory().is_some());
        assert!(AqiCategory::Severe.advisory().is_some());
        assert_eq!(AqiCategory::VeryPoor.to_string(), "Very Poor");
    }

    #[test]
    fn current_reading_text() {
        let loc = Location::new("0912", "district", "Lucknow").with_state("09", "Uttar Pradesh");
        let data = DomainData::from_raw(
            &json!({"pm25_value": 156.74, "timestamp": "2025-01-13T14:30:00Z", "station_count": 4}),
            &["pm25_value"],
        );
        let (text, chart) = render_current(&loc, &data);
        assert!(text.contains("Lucknow District | Uttar Pradesh"));
        assert!(text.contains("**156.7 µg/m³** (Very Poor)"));
        assert!(text.contains("13 Jan 2025, 14:30 UTC"));
        assert!(text.contains("4 monitoring stations"));
        assert!(text.contains("Health Advisory"));
        assert!(chart.is_none());
    }

    #[test]
    fn forecast_text_and_sorted_chart() {
        let loc = Location::new("0912", "district", "Lucknow");
        let data = DomainData::from_raw(
            &json!({
                "predicted_pm25": 45,
                "sensor_count": 12,
                "pm25_time_series": [
                    {"target_time": "2025-01-14T02:00:00Z", "pm25": 40},
                    {"target_time": "2025-01-14T00:00:00Z", "pm25": 48},
                    {"target_time": "2025-01-14T01:00:00Z", "pm25": 44}
                ]
            }),
            &["predicted_pm25"],
        );
        let (text, chart) = render_forecast(&loc, &data, 3);
        assert!(text.starts_with("**PM2.5 Forecast for Lucknow**"));
        assert!(text.contains("**Predicted Level:** 45.0 µg/m³"));
        assert!(text.contains("Satisfactory"));
        assert!(text.contains("Next 3 days"));
        assert!(text.contains("12 monitoring stations"));
        assert!(!text.contains("Health Advisory"));
        assert!(text.contains("showing 3 data points"));

        let chart = chart.unwrap();
        assert_eq!(chart.chart_type, FORECAST_CHART);
        let times: Vec<&str> = chart.points.iter().map(|p| p.time.as_str()).collect();
        assert_eq!(
            times,
            ["2025-01-14T00:00:00Z", "2025-01-14T01:00:00Z", "2025-01-14T02:00:00Z"]
        );
    }

    #[test]
    fn single_day_period_is_24_hours() {
        let loc = Location::new("1", "city", "Pune");
        let data = DomainData::from_raw(&json!({"predicted_pm25": 300}), &["predicted_pm25"]);
        let (text, chart) = render_forecast(&loc, &data, 1);
        assert!(text.contains("Next 24 hours"));
        assert!(text.contains("Severe"));
        assert!(text.contains("Health Advisory for Forecasted Period"));
        assert!(chart.is_none());
    }
}
