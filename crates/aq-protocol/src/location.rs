//! Canonical places returned by the location-resolution collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resolved place at some administrative level (state, district, city, ward, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    /// Administrative level, lower-case (e.g. "district", "city", "ward").
    pub level: String,
    /// Display name of the place itself, without hierarchy context.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Location {
    pub fn new(code: impl Into<String>, level: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            level: level.into().to_lowercase(),
            name: name.into(),
            state_code: None,
            district: None,
            state: None,
            parent: None,
        }
    }

    pub fn with_state(mut self, state_code: impl Into<String>, state: impl Into<String>) -> Self {
        self.state_code = Some(state_code.into());
        self.state = Some(state.into());
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    /// Build from a loosely shaped resolver row.
    ///
    /// Name falls back through `name`, `location_name`, `place_name`,
    /// `area_name`, then `Location <code>`.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let map = raw.as_object()?;
        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|k| map.get(*k))
                .find_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };

        let code = text(&["code", "location_code"]).unwrap_or_default();
        let name = text(&["name", "location_name", "place_name", "area_name"])
            .or_else(|| (!code.is_empty()).then(|| format!("Location {code}")))?;

        Some(Self {
            level: text(&["level"]).unwrap_or_default().to_lowercase(),
            name,
            state_code: text(&["state_code"]),
            district: text(&["district", "district_name"]),
            state: text(&["state", "state_name"]),
            parent: text(&["parent", "parent_name"]),
            code,
        })
    }

    /// Human-readable label with hierarchy context, for disambiguation prompts.
    pub fn display_label(&self) -> String {
        let name = self.name.as_str();
        let district = self.district.as_deref();
        let state = self.state.as_deref();

        let mut parts: Vec<String> = match self.level.as_str() {
            "ward" => vec![
                name.to_string(),
                district.map(|d| format!("Ward in {d}")).unwrap_or_default(),
                state.unwrap_or_default().to_string(),
            ],
            "sub_district" | "subdistrict" => vec![
                format!("{name} Sub-district"),
                district.unwrap_or_default().to_string(),
                state.unwrap_or_default().to_string(),
            ],
            "district" => vec![
                format!("{name} District"),
                state.unwrap_or_default().to_string(),
            ],
            "district_hq" => vec![
                format!("{name} City"),
                "District HQ".to_string(),
                state.unwrap_or_default().to_string(),
            ],
            "city" => vec![
                format!("{name} City"),
                district.unwrap_or_default().to_string(),
                state.unwrap_or_default().to_string(),
            ],
            "state" => vec![format!("{name} State")],
            _ => {
                let mut parts = vec![name.to_string()];
                for extra in [self.parent.as_deref(), district, state].into_iter().flatten() {
                    if !parts.iter().any(|p| p == extra) {
                        parts.push(extra.to_string());
                    }
                }
                parts
            }
        };
        parts.retain(|p| !p.is_empty());
        parts.join(" | ")
    }
}
