//! Render-ready projection of a [`DiveLogRecord`].
//!
//! Renderers only ever see a [`ViewModel`]: every optional field of the
//! raw row has already been resolved to the text that goes on paper.

use crate::identity;
use crate::record::{DiveLogRecord, DiverEntry};
use chrono::NaiveDate;

/// Shown for any missing scalar field.
pub const NOT_AVAILABLE: &str = "N/A";

// ============================================================================
// Tri-state Values
// ============================================================================

/// A yes/no answer that may also be unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unset,
}

impl TriState {
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Yes,
            Some(false) => TriState::No,
            None => TriState::Unset,
        }
    }

    /// Marks for the printed yes/no box pair.
    pub fn marks(self) -> CheckPair {
        CheckPair {
            first: self == TriState::Yes,
            second: self == TriState::No,
        }
    }
}

/// Weather flag as filled in by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    Favorable,
    Unfavorable,
    #[default]
    Unset,
}

impl Weather {
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Weather::Favorable,
            Some(false) => Weather::Unfavorable,
            None => Weather::Unset,
        }
    }

    pub fn marks(self) -> CheckPair {
        CheckPair {
            first: self == Weather::Favorable,
            second: self == Weather::Unfavorable,
        }
    }
}

/// Two independent checkboxes; at most one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckPair {
    pub first: bool,
    pub second: bool,
}

// ============================================================================
// Crew Roles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiverRole {
    Diver,
    EmergencyDiver,
    Supervisor,
    Assistant,
    Other(String),
    #[default]
    Unspecified,
}

impl DiverRole {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return DiverRole::Unspecified;
        };
        let key = raw.to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "diver" | "buzo" => DiverRole::Diver,
            "emergency_diver" | "emergency" | "buzo_emergencia" | "buzo_de_emergencia" => {
                DiverRole::EmergencyDiver
            }
            "supervisor" => DiverRole::Supervisor,
            "assistant" | "asistente" | "tender" => DiverRole::Assistant,
            _ => DiverRole::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DiverRole::Diver => "Buzo",
            DiverRole::EmergencyDiver => "Buzo emergencia",
            DiverRole::Supervisor => "Supervisor",
            DiverRole::Assistant => "Asistente",
            DiverRole::Other(raw) => raw,
            DiverRole::Unspecified => "",
        }
    }
}

// ============================================================================
// View Model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DiverView {
    pub name: String,
    pub license: String,
    pub role: DiverRole,
    pub standard_depth: TriState,
    pub working_depth: String,
    pub start_time: String,
    pub end_time: String,
    pub elapsed: String,
    pub work_description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub record_id: String,
    pub short_id: String,
    pub verification_code: String,
    pub filename: String,
    pub log_date: String,
    pub center: String,
    pub dive_site: String,
    pub boat: String,
    pub supervisor: String,
    pub supervisor_license: String,
    pub center_manager: String,
    pub center_assistant: String,
    pub weather: Weather,
    pub weather_notes: String,
    pub compressors: [String; 2],
    pub work_order: String,
    pub start_time: String,
    pub end_time: String,
    pub observations: String,
    pub signature_ref: Option<String>,
    /// Full manifest; the printed table only takes the first four.
    pub crew: Vec<DiverView>,
}

/// Resolve every optional field of `record` to display text.
///
/// Never fails: malformed input falls back to defaults.
pub fn normalize(record: &DiveLogRecord) -> ViewModel {
    let record_id = record
        .id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    ViewModel {
        short_id: identity::short_id(&record_id),
        verification_code: identity::verification_code(&record_id),
        filename: identity::document_filename(
            record.center_name.as_deref(),
            record.log_date.as_deref(),
            &record_id,
        ),
        log_date: format_log_date(record.log_date.as_deref()),
        center: or_not_available(&record.center_name),
        dive_site: or_not_available(&record.dive_site_name),
        boat: or_not_available(&record.boat_name),
        supervisor: or_not_available(&record.supervisor_name),
        supervisor_license: or_not_available(&record.supervisor_license),
        center_manager: or_not_available(&record.center_manager),
        center_assistant: or_not_available(&record.center_assistant),
        weather: Weather::from_option(record.weather_good),
        weather_notes: or_empty(&record.weather_conditions),
        compressors: [
            or_not_available(&record.compressor_1),
            or_not_available(&record.compressor_2),
        ],
        work_order: or_not_available(&record.work_order_number),
        start_time: format_time(record.start_time.as_deref()),
        end_time: format_time(record.end_time.as_deref()),
        observations: or_empty(&record.observations),
        signature_ref: record
            .signature_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        crew: record.crew_manifest().iter().map(normalize_diver).collect(),
        record_id,
    }
}

fn normalize_diver(entry: &DiverEntry) -> DiverView {
    DiverView {
        name: or_empty(&entry.name),
        license: or_empty(&entry.license),
        role: DiverRole::parse(entry.role.as_deref()),
        standard_depth: TriState::from_option(entry.standard_depth),
        working_depth: entry.working_depth.map(format_depth).unwrap_or_default(),
        start_time: format_time(entry.start_time.as_deref()),
        end_time: format_time(entry.end_time.as_deref()),
        elapsed: format_elapsed(entry.dive_time.as_deref()),
        work_description: or_empty(&entry.work_description),
    }
}

// ============================================================================
// Formatting Helpers
// ============================================================================

fn clean(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn or_not_available(value: &Option<String>) -> String {
    clean(value).unwrap_or(NOT_AVAILABLE).to_string()
}

fn or_empty(value: &Option<String>) -> String {
    clean(value).unwrap_or_default().to_string()
}

/// `dd/mm/yyyy`; unparseable dates are printed as given.
fn format_log_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    let date_part = raw.split('T').next().unwrap_or(raw);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `HH:MM`, dropping seconds when present.
fn format_time(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let mut parts = raw.split(':');
    match (parts.next(), parts.next()) {
        (Some(h), Some(m)) if h.len() <= 2 && m.len() == 2 => format!("{:0>2}:{}", h, m),
        _ => raw.to_string(),
    }
}

fn format_depth(meters: f64) -> String {
    if meters.fract() == 0.0 {
        format!("{}", meters as i64)
    } else {
        format!("{:.1}", meters)
    }
}

/// Bare numbers are minutes.
fn format_elapsed(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    match raw.parse::<f64>() {
        Ok(minutes) if minutes.is_finite() => format!("{} min", format_depth(minutes)),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> DiveLogRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_record_fully_defaulted() {
        let vm = normalize(&DiveLogRecord::default());

        assert_eq!(vm.center, NOT_AVAILABLE);
        assert_eq!(vm.log_date, NOT_AVAILABLE);
        assert_eq!(vm.observations, "");
        assert_eq!(vm.weather, Weather::Unset);
        assert_eq!(vm.signature_ref, None);
        assert!(vm.crew.is_empty());
        assert_eq!(vm.filename, "bitacora-sin-centro-sin-fecha-.pdf");
    }

    #[test]
    fn test_example_record() {
        let vm = normalize(&record(json!({
            "id": "abc123def456",
            "log_date": "2024-03-10",
            "centers": { "name": "Puerto Varas" },
            "divers_manifest": [ { "name": "Ana" } ],
            "signature_url": null
        })));

        assert_eq!(vm.filename, "bitacora-Puerto-Varas-2024-03-10-def456.pdf");
        assert_eq!(vm.log_date, "10/03/2024");
        assert_eq!(vm.short_id, "DEF456");
        assert_eq!(vm.verification_code, "DL-ABC123DE");
        assert_eq!(vm.crew.len(), 1);
        assert_eq!(vm.crew[0].name, "Ana");
        assert_eq!(vm.crew[0].license, "");
        assert_eq!(vm.crew[0].standard_depth, TriState::Unset);
    }

    #[test]
    fn test_blank_signature_is_unsigned() {
        let vm = normalize(&record(json!({ "signature_url": "   " })));
        assert_eq!(vm.signature_ref, None);
    }

    fn pair(marks: CheckPair) -> (bool, bool) {
        (marks.first, marks.second)
    }

    #[test]
    fn test_tristate_marks() {
        assert_eq!(pair(TriState::Yes.marks()), (true, false));
        assert_eq!(pair(TriState::No.marks()), (false, true));
        assert_eq!(pair(TriState::Unset.marks()), (false, false));
        assert_eq!(pair(Weather::Unfavorable.marks()), (false, true));
    }

    #[test]
    fn test_diver_formatting() {
        let vm = normalize(&record(json!({
            "divers_manifest": [{
                "name": " Luis ",
                "role": "emergency-diver",
                "standard_depth": false,
                "working_depth": 18,
                "start_time": "9:05:00",
                "end_time": "10:20",
                "dive_time": 75
            }]
        })));

        let diver = &vm.crew[0];
        assert_eq!(diver.name, "Luis");
        assert_eq!(diver.role, DiverRole::EmergencyDiver);
        assert_eq!(diver.role.label(), "Buzo emergencia");
        assert_eq!(diver.standard_depth, TriState::No);
        assert_eq!(diver.working_depth, "18");
        assert_eq!(diver.start_time, "09:05");
        assert_eq!(diver.end_time, "10:20");
        assert_eq!(diver.elapsed, "75 min");
    }

    #[test]
    fn test_unknown_role_kept_verbatim() {
        assert_eq!(DiverRole::parse(Some("Tender jefe")).label(), "Tender jefe");
        assert_eq!(DiverRole::parse(Some("  ")), DiverRole::Unspecified);
    }

    #[test]
    fn test_unparseable_date_printed_as_given() {
        let vm = normalize(&record(json!({ "log_date": "marzo 2024" })));
        assert_eq!(vm.log_date, "marzo 2024");
    }
}
