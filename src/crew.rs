//! Fixed-capacity crew roster table.
//!
//! The printed form has exactly four numbered crew rows. Entries past the
//! fourth only appear in the work-performed narratives.

use crate::form::check_key;
use crate::geometry::LayoutMode;
use crate::model::{CheckPair, DiverView};
use std::ops::Range;

/// Rows on the printed form.
pub const CREW_SLOTS: usize = 4;

/// First row (0-based) that moves to page 2 in the paginated layout.
pub const PAGE_SPLIT_ROW: usize = 2;

pub const CONTINUATION_SUFFIX: &str = "(continuación)";

pub const DEPTH_HEADER: &str = "Prof. <=20m";
pub const DEPTH_YES: &str = "Sí";
pub const DEPTH_NO: &str = "No";

// ============================================================================
// Columns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrewColumnKind {
    Number,
    Name,
    License,
    Role,
    StandardDepth,
    WorkingDepth,
    Start,
    End,
    Elapsed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrewColumn {
    pub kind: CrewColumnKind,
    pub header: &'static str,
    /// Share of the table width; all columns sum to 1.
    pub width_ratio: f32,
}

const fn column(kind: CrewColumnKind, header: &'static str, width_ratio: f32) -> CrewColumn {
    CrewColumn {
        kind,
        header,
        width_ratio,
    }
}

pub const CREW_COLUMNS: [CrewColumn; 9] = [
    column(CrewColumnKind::Number, "N°", 0.05),
    column(CrewColumnKind::Name, "Identificación", 0.23),
    column(CrewColumnKind::License, "Matrícula", 0.12),
    column(CrewColumnKind::Role, "Cargo", 0.13),
    column(CrewColumnKind::StandardDepth, DEPTH_HEADER, 0.12),
    column(CrewColumnKind::WorkingDepth, "Prof. (m)", 0.10),
    column(CrewColumnKind::Start, "Inicio", 0.08),
    column(CrewColumnKind::End, "Término", 0.08),
    column(CrewColumnKind::Elapsed, "Tiempo", 0.09),
];

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CrewCells {
    pub name: String,
    pub license: String,
    pub role: String,
    pub standard_depth: CheckPair,
    pub working_depth: String,
    pub start: String,
    pub end: String,
    pub elapsed: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewRow {
    /// 1-based row number printed in the first column.
    pub number: usize,
    pub cells: Option<CrewCells>,
}

impl CrewRow {
    /// Text for a text column; empty for missing entries. The
    /// standard-depth column is drawn as boxes and has no text.
    pub fn text(&self, kind: CrewColumnKind) -> String {
        if kind == CrewColumnKind::Number {
            return self.number.to_string();
        }
        let Some(cells) = &self.cells else {
            return String::new();
        };
        match kind {
            CrewColumnKind::Name => cells.name.clone(),
            CrewColumnKind::License => cells.license.clone(),
            CrewColumnKind::Role => cells.role.clone(),
            CrewColumnKind::WorkingDepth => cells.working_depth.clone(),
            CrewColumnKind::Start => cells.start.clone(),
            CrewColumnKind::End => cells.end.clone(),
            CrewColumnKind::Elapsed => cells.elapsed.clone(),
            CrewColumnKind::Number | CrewColumnKind::StandardDepth => String::new(),
        }
    }

    /// Checkbox names for the standard-depth pair, yes then no.
    pub fn depth_keys(&self) -> [String; 2] {
        let group = format!("Fila {} {}", self.number, DEPTH_HEADER);
        [DEPTH_YES, DEPTH_NO].map(|option| check_key(&group, option))
    }

    pub fn depth_marks(&self) -> CheckPair {
        self.cells
            .as_ref()
            .map(|c| c.standard_depth)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewTable {
    rows: Vec<CrewRow>,
}

impl CrewTable {
    /// Always [`CREW_SLOTS`] rows.
    pub fn rows(&self) -> &[CrewRow] {
        &self.rows
    }

    pub fn rows_in(&self, range: Range<usize>) -> &[CrewRow] {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        &self.rows[start..end]
    }

    /// Column widths in mm for a table `total_mm` wide.
    pub fn column_widths(total_mm: f32) -> [f32; 9] {
        CREW_COLUMNS.map(|c| c.width_ratio * total_mm)
    }
}

// ============================================================================
// Policy
// ============================================================================

pub struct CrewTablePolicy;

impl CrewTablePolicy {
    /// Lay the first four manifest entries into the four numbered rows.
    pub fn layout_crew(crew: &[DiverView]) -> CrewTable {
        let rows = (0..CREW_SLOTS)
            .map(|slot| CrewRow {
                number: slot + 1,
                cells: crew.get(slot).map(|d| CrewCells {
                    name: d.name.clone(),
                    license: d.license.clone(),
                    role: d.role.label().to_string(),
                    standard_depth: d.standard_depth.marks(),
                    working_depth: d.working_depth.clone(),
                    start: d.start_time.clone(),
                    end: d.end_time.clone(),
                    elapsed: d.elapsed.clone(),
                }),
            })
            .collect();

        CrewTable { rows }
    }

    /// Row ranges per page. The split point is fixed, not content-driven.
    pub fn page_splits(mode: LayoutMode) -> Vec<Range<usize>> {
        match mode {
            LayoutMode::Compact => vec![0..CREW_SLOTS],
            LayoutMode::Paginated => vec![0..PAGE_SPLIT_ROW, PAGE_SPLIT_ROW..CREW_SLOTS],
        }
    }

    pub fn heading(title: &str, continuation: bool) -> String {
        if continuation {
            format!("{} {}", title, CONTINUATION_SUFFIX)
        } else {
            title.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiverRole, TriState};

    fn diver(name: &str, depth: TriState) -> DiverView {
        DiverView {
            name: name.to_string(),
            license: String::new(),
            role: DiverRole::Diver,
            standard_depth: depth,
            working_depth: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            elapsed: String::new(),
            work_description: String::new(),
        }
    }

    #[test]
    fn test_column_ratios_fill_width() {
        let sum: f32 = CREW_COLUMNS.iter().map(|c| c.width_ratio).sum();
        assert!((sum - 1.0).abs() < 1e-4);
        let widths = CrewTable::column_widths(190.0);
        assert!((widths.iter().sum::<f32>() - 190.0).abs() < 1e-3);
    }

    #[test]
    fn test_always_four_rows() {
        for count in 0..=6 {
            let crew: Vec<_> = (0..count)
                .map(|i| diver(&format!("B{}", i), TriState::Unset))
                .collect();
            let table = CrewTablePolicy::layout_crew(&crew);
            assert_eq!(table.rows().len(), CREW_SLOTS);
            assert_eq!(
                table.rows().iter().filter(|r| r.cells.is_some()).count(),
                count.min(CREW_SLOTS)
            );
            let numbers: Vec<_> = table.rows().iter().map(|r| r.number).collect();
            assert_eq!(numbers, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_excess_entries_not_in_table() {
        let crew: Vec<_> = (0..5)
            .map(|i| diver(&format!("B{}", i), TriState::Unset))
            .collect();
        let table = CrewTablePolicy::layout_crew(&crew);
        for row in table.rows() {
            assert_ne!(row.text(CrewColumnKind::Name), "B4");
        }
    }

    #[test]
    fn test_missing_rows_render_empty() {
        let table = CrewTablePolicy::layout_crew(&[diver("Ana", TriState::Unset)]);
        assert_eq!(table.rows()[0].text(CrewColumnKind::Name), "Ana");
        assert_eq!(table.rows()[0].text(CrewColumnKind::License), "");
        for row in &table.rows()[1..] {
            assert_eq!(row.text(CrewColumnKind::Name), "");
            assert_eq!(row.depth_marks(), CheckPair::default());
        }
    }

    #[test]
    fn test_depth_checkbox_mapping() {
        let table = CrewTablePolicy::layout_crew(&[
            diver("a", TriState::Yes),
            diver("b", TriState::No),
            diver("c", TriState::Unset),
        ]);
        let marks: Vec<_> = table.rows().iter().map(CrewRow::depth_marks).collect();
        assert_eq!((marks[0].first, marks[0].second), (true, false));
        assert_eq!((marks[1].first, marks[1].second), (false, true));
        assert_eq!(marks[2], CheckPair::default());
        assert_eq!(marks[3], CheckPair::default());
        assert_eq!(table.rows()[1].depth_keys()[1], "Fila 2 Prof. <=20m: No");
    }

    #[test]
    fn test_split_is_fixed() {
        let splits = CrewTablePolicy::page_splits;
        assert_eq!(splits(LayoutMode::Compact), vec![0..4]);
        assert_eq!(splits(LayoutMode::Paginated), vec![0..2, 2..4]);

        let table = CrewTablePolicy::layout_crew(&[]);
        assert_eq!(table.rows_in(2..4).len(), 2);
        assert_eq!(table.rows_in(2..4)[0].number, 3);
        assert_eq!(
            CrewTablePolicy::heading("PERSONAL DE BUCEO", true),
            "PERSONAL DE BUCEO (continuación)"
        );
    }
}
