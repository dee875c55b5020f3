//! What goes into each region of the form, independent of how it is drawn.
//!
//! Backends iterate these descriptions so that the field set, labels and
//! ordering are identical in every output.

use crate::geometry::PagePlan;
use crate::model::{CheckPair, ViewModel};

pub const TITLE: &str = "BITÁCORA DE BUCEO";
pub const SUBTITLE: &str = "Registro de faena de buceo profesional";

pub const WEATHER_OPTIONS: [&str; 2] = ["Favorable", "Desfavorable"];

/// One labelled box in a row of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: &'static str,
    pub value: FieldValue,
    /// Share of the row width.
    pub width_ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Two labelled checkboxes followed by free text.
    Choice {
        options: [&'static str; 2],
        marks: CheckPair,
        notes: String,
    },
}

impl FieldValue {
    /// Checkbox names for a choice, in drawing order.
    pub fn choice_keys(label: &str, options: &[&str; 2]) -> [String; 2] {
        (*options).map(|option| check_key(label, option))
    }
}

/// Name under which a drawn checkbox is recorded in a page summary.
pub fn check_key(group: &str, option: &str) -> String {
    format!("{}: {}", group, option)
}

impl Field {
    fn text(label: &'static str, value: &str, width_ratio: f32) -> Self {
        Self {
            label,
            value: FieldValue::Text(value.to_string()),
            width_ratio,
        }
    }
}

/// Text lines printed in the header of every page.
pub fn header_lines(vm: &ViewModel, plan: &PagePlan) -> [String; 3] {
    [
        TITLE.to_string(),
        SUBTITLE.to_string(),
        format!(
            "Folio {} · Hoja {}/{}",
            vm.short_id, plan.index + 1, plan.total
        ),
    ]
}

pub fn meta_fields(vm: &ViewModel) -> Vec<Field> {
    vec![
        Field::text("Folio", &vm.short_id, 0.25),
        Field::text("Fecha", &vm.log_date, 0.25),
        Field::text("N° Orden de trabajo", &vm.work_order, 0.5),
    ]
}

/// Rows of the general-data block, top to bottom.
pub fn general_rows(vm: &ViewModel) -> Vec<Vec<Field>> {
    vec![
        vec![
            Field::text("Centro", &vm.center, 0.5),
            Field::text("Sitio de buceo", &vm.dive_site, 0.5),
        ],
        vec![
            Field::text("Embarcación", &vm.boat, 0.5),
            Field::text("Compresor 1", &vm.compressors[0], 0.25),
            Field::text("Compresor 2", &vm.compressors[1], 0.25),
        ],
        vec![
            Field::text("Supervisor", &vm.supervisor, 0.6),
            Field::text("Matrícula supervisor", &vm.supervisor_license, 0.4),
        ],
        vec![
            Field::text("Jefe de centro", &vm.center_manager, 0.5),
            Field::text("Asistente de centro", &vm.center_assistant, 0.5),
        ],
        vec![
            Field::text("Hora inicio", &vm.start_time, 0.5),
            Field::text("Hora término", &vm.end_time, 0.5),
        ],
        vec![Field {
            label: "Condición meteorológica",
            value: FieldValue::Choice {
                options: WEATHER_OPTIONS,
                marks: vm.weather.marks(),
                notes: vm.weather_notes.clone(),
            },
            width_ratio: 1.0,
        }],
    ]
}

/// Work-performed block for one crew member.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub heading: String,
    pub body: String,
}

/// One narrative per manifest entry, including entries past the fourth.
/// Entries with neither a name nor a description are skipped.
pub fn narratives(vm: &ViewModel) -> Vec<Narrative> {
    vm.crew
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.name.is_empty() || !d.work_description.is_empty())
        .map(|(i, d)| {
            let name = if d.name.is_empty() {
                "Sin nombre"
            } else {
                d.name.as_str()
            };
            let role = d.role.label();
            let heading = if role.is_empty() {
                format!("{}. {}", i + 1, name)
            } else {
                format!("{}. {} ({})", i + 1, name, role)
            };
            Narrative {
                heading,
                body: d.work_description.clone(),
            }
        })
        .collect()
}

/// Shown in the narratives region when no crew member has one.
pub const NO_NARRATIVES: &str = "Sin trabajos registrados.";

pub const SUPERVISOR_SIGNATURE_TITLE: &str = "Supervisor de buceo";
pub const MANAGER_SIGNATURE_TITLE: &str = "Jefe de centro";

/// Caption lines under each signature box: title, then name.
pub fn signature_captions(vm: &ViewModel) -> [(&'static str, String); 2] {
    [
        (SUPERVISOR_SIGNATURE_TITLE, vm.supervisor.clone()),
        (MANAGER_SIGNATURE_TITLE, vm.center_manager.clone()),
    ]
}
