//! Page geometry and region order shared by every backend.
//!
//! Coordinates are millimetres. `content_top()` is measured from the bottom
//! edge of the page, the way PDF places things; backends working top-down
//! convert with [`LayoutGeometry::from_top`].

use crate::crew::CrewTablePolicy;
use std::ops::Range;

// ============================================================================
// Constants
// ============================================================================

/// US Letter dimensions in mm
pub const LETTER: PageSize = PageSize {
    width_mm: 215.9,
    height_mm: 279.4,
};

/// Margins
pub const MARGIN_MM: f32 = 12.0;

/// Vertical gap between consecutive regions
pub const REGION_GAP_MM: f32 = 2.5;

pub const PT_TO_MM: f32 = 0.352_778;

/// Average Helvetica advance as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.52;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

// ============================================================================
// Regions
// ============================================================================

/// Named blocks of the form, in the order they appear on paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Header,
    MetaBox,
    GeneralData,
    CrewTable,
    DiverNarratives,
    Observations,
    Signatures,
    Footer,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Header,
        Region::MetaBox,
        Region::GeneralData,
        Region::CrewTable,
        Region::DiverNarratives,
        Region::Observations,
        Region::Signatures,
        Region::Footer,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Region::Header => "BITÁCORA DE BUCEO",
            Region::MetaBox => "Identificación del registro",
            Region::GeneralData => "DATOS GENERALES",
            Region::CrewTable => "PERSONAL DE BUCEO",
            Region::DiverNarratives => "TRABAJO REALIZADO",
            Region::Observations => "OBSERVACIONES",
            Region::Signatures => "FIRMAS",
            Region::Footer => "",
        }
    }
}

/// How tall a region is allowed to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionHeight {
    Fixed(f32),
    /// Grows with its content; never truncated.
    AtLeast(f32),
}

impl RegionHeight {
    pub fn base(self) -> f32 {
        match self {
            RegionHeight::Fixed(h) | RegionHeight::AtLeast(h) => h,
        }
    }

    /// Final height for content that needs `needed` mm.
    pub fn resolve(self, needed: f32) -> f32 {
        match self {
            RegionHeight::Fixed(h) => h,
            RegionHeight::AtLeast(h) => h.max(needed),
        }
    }
}

// ============================================================================
// Layout Mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Everything on one page, long fields truncated.
    #[default]
    Compact,
    /// Two pages, crew table split after row 2.
    Paginated,
}

impl LayoutMode {
    pub fn page_count(self) -> usize {
        match self {
            LayoutMode::Compact => 1,
            LayoutMode::Paginated => 2,
        }
    }
}

/// Font sizes (pt) and rhythm (mm) for one layout mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub title_pt: f32,
    pub section_pt: f32,
    pub label_pt: f32,
    pub value_pt: f32,
    pub small_pt: f32,
    pub line_mm: f32,
    pub field_row_mm: f32,
    pub crew_header_mm: f32,
    pub crew_row_mm: f32,
    pub section_title_mm: f32,
}

const COMPACT_METRICS: Metrics = Metrics {
    title_pt: 14.0,
    section_pt: 8.5,
    label_pt: 6.5,
    value_pt: 8.0,
    small_pt: 6.0,
    line_mm: 3.6,
    field_row_mm: 8.0,
    crew_header_mm: 9.0,
    crew_row_mm: 6.5,
    section_title_mm: 5.0,
};

const PAGINATED_METRICS: Metrics = Metrics {
    title_pt: 18.0,
    section_pt: 10.0,
    label_pt: 7.5,
    value_pt: 10.0,
    small_pt: 7.0,
    line_mm: 4.6,
    field_row_mm: 10.5,
    crew_header_mm: 11.0,
    crew_row_mm: 9.0,
    section_title_mm: 6.5,
};

// ============================================================================
// Page Plans
// ============================================================================

/// Which regions one physical page carries.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub index: usize,
    pub total: usize,
    pub regions: Vec<Region>,
    /// Crew table rows (0-based) printed on this page.
    pub crew_rows: Range<usize>,
    /// The crew table on this page continues one from a previous page.
    pub continuation: bool,
}

impl PagePlan {
    pub fn footer_label(&self) -> String {
        format!("Página {} de {}", self.index + 1, self.total)
    }
}

// ============================================================================
// Layout Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutGeometry {
    pub page: PageSize,
    pub margin_mm: f32,
    pub mode: LayoutMode,
}

impl LayoutGeometry {
    pub fn new(mode: LayoutMode) -> Self {
        Self {
            page: LETTER,
            margin_mm: MARGIN_MM,
            mode,
        }
    }

    pub fn metrics(&self) -> Metrics {
        match self.mode {
            LayoutMode::Compact => COMPACT_METRICS,
            LayoutMode::Paginated => PAGINATED_METRICS,
        }
    }

    pub fn content_left(&self) -> f32 {
        self.margin_mm
    }

    pub fn content_width(&self) -> f32 {
        self.page.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_right(&self) -> f32 {
        self.content_left() + self.content_width()
    }

    pub fn content_height(&self) -> f32 {
        self.page.height_mm - 2.0 * self.margin_mm
    }

    /// Top of the content area, measured from the bottom edge.
    pub fn content_top(&self) -> f32 {
        self.page.height_mm - self.margin_mm
    }

    pub fn content_bottom(&self) -> f32 {
        self.margin_mm
    }

    /// Convert a distance below the top edge into a bottom-up y.
    pub fn from_top(&self, offset_mm: f32) -> f32 {
        self.page.height_mm - offset_mm
    }

    pub fn region_height(&self, region: Region, crew_rows: usize) -> RegionHeight {
        let m = self.metrics();
        let compact = self.mode == LayoutMode::Compact;
        match region {
            Region::Header => RegionHeight::Fixed(if compact { 16.0 } else { 22.0 }),
            Region::MetaBox => RegionHeight::Fixed(if compact { 9.0 } else { 12.0 }),
            Region::GeneralData => RegionHeight::Fixed(m.section_title_mm + 6.0 * m.field_row_mm),
            Region::CrewTable => RegionHeight::Fixed(
                m.section_title_mm + m.crew_header_mm + crew_rows as f32 * m.crew_row_mm,
            ),
            Region::DiverNarratives => {
                RegionHeight::AtLeast(if compact { 24.0 } else { 40.0 })
            }
            Region::Observations => RegionHeight::AtLeast(if compact { 18.0 } else { 32.0 }),
            Region::Signatures => RegionHeight::Fixed(if compact { 36.0 } else { 46.0 }),
            Region::Footer => RegionHeight::Fixed(if compact { 5.0 } else { 6.0 }),
        }
    }

    /// Page plans for the current mode. Every page starts with the header
    /// and ends with the footer.
    pub fn page_plans(&self) -> Vec<PagePlan> {
        let splits = CrewTablePolicy::page_splits(self.mode);
        let total = splits.len();

        match self.mode {
            LayoutMode::Compact => vec![PagePlan {
                index: 0,
                total,
                regions: Region::ALL.to_vec(),
                crew_rows: splits[0].clone(),
                continuation: false,
            }],
            LayoutMode::Paginated => vec![
                PagePlan {
                    index: 0,
                    total,
                    regions: vec![
                        Region::Header,
                        Region::MetaBox,
                        Region::GeneralData,
                        Region::CrewTable,
                        Region::Footer,
                    ],
                    crew_rows: splits[0].clone(),
                    continuation: false,
                },
                PagePlan {
                    index: 1,
                    total,
                    regions: vec![
                        Region::Header,
                        Region::CrewTable,
                        Region::DiverNarratives,
                        Region::Observations,
                        Region::Signatures,
                        Region::Footer,
                    ],
                    crew_rows: splits[1].clone(),
                    continuation: true,
                },
            ],
        }
    }
}

// ============================================================================
// Text Measurement
// ============================================================================

/// Estimated width of `text` set in Helvetica at `size_pt`.
pub fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * AVG_GLYPH_EM * PT_TO_MM
}

/// Greedy word wrap. Explicit newlines are kept; words longer than a line
/// are hard-broken. Never drops text.
pub fn wrap_text(text: &str, width_mm: f32, size_pt: f32) -> Vec<String> {
    let max_chars = ((width_mm / (size_pt * AVG_GLYPH_EM * PT_TO_MM)).floor() as usize).max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if line_len == 0 {
                word.len()
            } else {
                line_len + 1 + word.len()
            };
            if needed > max_chars && line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }

        if line_len > 0 || paragraph.trim().is_empty() {
            lines.push(line);
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}
