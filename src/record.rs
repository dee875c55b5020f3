//! Raw dive log rows as handed over by the data layer.
//!
//! The row is already joined (center, site and boat names resolved), but
//! any field may be missing, null or of an unexpected JSON type. Parsing
//! is lenient: a field that does not fit becomes `None` instead of
//! failing the whole record.

use crate::error::RecordError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Data Structures
// ============================================================================

/// One dive log row, fully joined.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiveLogRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub log_date: Option<String>,
    #[serde(rename = "centers", alias = "center", deserialize_with = "lenient_ref")]
    pub center_name: Option<String>,
    #[serde(rename = "dive_sites", alias = "dive_site", deserialize_with = "lenient_ref")]
    pub dive_site_name: Option<String>,
    #[serde(rename = "boats", alias = "boat", deserialize_with = "lenient_ref")]
    pub boat_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub supervisor_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub supervisor_license: Option<String>,
    #[serde(alias = "center_manager_name", deserialize_with = "lenient_string")]
    pub center_manager: Option<String>,
    #[serde(alias = "center_assistant_name", deserialize_with = "lenient_string")]
    pub center_assistant: Option<String>,
    #[serde(alias = "weather_favorable", deserialize_with = "lenient_bool")]
    pub weather_good: Option<bool>,
    #[serde(alias = "weather_notes", deserialize_with = "lenient_string")]
    pub weather_conditions: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub compressor_1: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub compressor_2: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub work_order_number: Option<String>,
    #[serde(alias = "departure_time", deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
    #[serde(alias = "arrival_time", deserialize_with = "lenient_string")]
    pub end_time: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub observations: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub signature_url: Option<String>,
    /// Stored as whatever the row holds; see [`DiveLogRecord::crew_manifest`].
    pub divers_manifest: Value,
}

/// One crew member in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiverEntry {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(alias = "license_number", deserialize_with = "lenient_string")]
    pub license: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub standard_depth: Option<bool>,
    #[serde(deserialize_with = "lenient_f64")]
    pub working_depth: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub end_time: Option<String>,
    #[serde(alias = "elapsed_time", alias = "bottom_time", deserialize_with = "lenient_string")]
    pub dive_time: Option<String>,
    #[serde(alias = "work_performed", deserialize_with = "lenient_string")]
    pub work_description: Option<String>,
}

impl DiveLogRecord {
    /// Parse a record from JSON text. Only a non-object document is an
    /// error; individual fields degrade to `None`.
    pub fn from_json_str(input: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(input)?;
        if !value.is_object() {
            return Err(RecordError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The crew manifest coerced to a list.
    ///
    /// Accepts an array or a string holding a JSON array. Anything else
    /// collapses to an empty list. Entries that are not objects become
    /// empty entries so positions are kept.
    pub fn crew_manifest(&self) -> Vec<DiverEntry> {
        coerce_manifest(&self.divers_manifest)
    }

    pub fn is_signed(&self) -> bool {
        self.signature_url
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

fn coerce_manifest(value: &Value) -> Vec<DiverEntry> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                if item.is_object() {
                    serde_json::from_value(item.clone()).unwrap_or_default()
                } else {
                    DiverEntry::default()
                }
            })
            .collect(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Array(_)) => coerce_manifest(&inner),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// ============================================================================
// Lenient Field Parsing
// ============================================================================

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

/// A joined reference: `{ "name": ... }` or a bare string.
fn lenient_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(mut map) => map.remove("name").and_then(scalar_to_string),
        other => scalar_to_string(other),
    })
}

/// Only JSON `true` and `false` count; strings and numbers are unset.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_joined_names_resolve() {
        let record: DiveLogRecord = serde_json::from_value(json!({
            "id": "abc123def456",
            "centers": { "name": "Puerto Varas" },
            "dive_sites": "Canal Tenglo",
            "boats": null
        }))
        .unwrap();

        assert_eq!(record.center_name.as_deref(), Some("Puerto Varas"));
        assert_eq!(record.dive_site_name.as_deref(), Some("Canal Tenglo"));
        assert_eq!(record.boat_name, None);
    }

    #[test]
    fn test_wrong_types_degrade_instead_of_failing() {
        let record: DiveLogRecord = serde_json::from_value(json!({
            "id": 42,
            "weather_good": "yes",
            "work_order_number": 1881,
            "observations": { "nested": true }
        }))
        .unwrap();

        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.weather_good, None);
        assert_eq!(record.work_order_number.as_deref(), Some("1881"));
        assert_eq!(record.observations, None);
    }

    #[test]
    fn test_manifest_accepts_json_string() {
        let record: DiveLogRecord = serde_json::from_value(json!({
            "divers_manifest": "[{\"name\":\"Ana\",\"standard_depth\":true}]"
        }))
        .unwrap();

        let crew = record.crew_manifest();
        assert_eq!(crew.len(), 1);
        assert_eq!(crew[0].name.as_deref(), Some("Ana"));
        assert_eq!(crew[0].standard_depth, Some(true));
    }

    #[test]
    fn test_manifest_invalid_collapses_to_empty() {
        for manifest in [json!("not json"), json!(17), json!({"name": "Ana"}), Value::Null] {
            let record: DiveLogRecord =
                serde_json::from_value(json!({ "divers_manifest": manifest })).unwrap();
            assert!(record.crew_manifest().is_empty());
        }
    }

    #[test]
    fn test_manifest_keeps_positions_of_bad_entries() {
        let record: DiveLogRecord = serde_json::from_value(json!({
            "divers_manifest": [ "junk", { "name": "Luis", "working_depth": "18,5" } ]
        }))
        .unwrap();

        let crew = record.crew_manifest();
        assert_eq!(crew.len(), 2);
        assert_eq!(crew[0], DiverEntry::default());
        assert_eq!(crew[1].working_depth, Some(18.5));
    }

    #[test]
    fn test_from_json_str_rejects_non_objects() {
        assert!(matches!(
            DiveLogRecord::from_json_str("[1, 2]"),
            Err(RecordError::NotAnObject)
        ));
        assert!(DiveLogRecord::from_json_str("{").is_err());
    }

    #[test]
    fn test_departure_alias() {
        let record = DiveLogRecord::from_json_str(
            r#"{"departure_time": "08:15", "arrival_time": "12:40"}"#,
        )
        .unwrap();
        assert_eq!(record.start_time.as_deref(), Some("08:15"));
        assert_eq!(record.end_time.as_deref(), Some("12:40"));
    }
}
