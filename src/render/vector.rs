//! Vector backend: positioned PDF primitives.
//!
//! A single cursor walks down the page; every region is drawn as boxes,
//! label/value text pairs, lines and checkbox glyphs at explicit
//! coordinates. Values in fixed-size boxes are cut to a [`TextBudget`] so
//! nothing spills into a neighbouring box; growable regions (narratives,
//! observations) wrap instead.

use super::pdf::{self, Fonts};
use super::{base_warnings, Backend, PageSummary, RenderContext, RenderedDocument, Renderer};
use crate::crew::{
    CrewColumnKind, CrewRow, CrewTable, CrewTablePolicy, CREW_COLUMNS, DEPTH_NO, DEPTH_YES,
};
use crate::error::{RenderError, RenderWarning};
use crate::form::{self, Field, FieldValue};
use crate::geometry::{
    text_width_mm, wrap_text, LayoutGeometry, LayoutMode, Metrics, PagePlan, Region, PT_TO_MM,
    REGION_GAP_MM,
};
use crate::signature::{self, SignatureBlock};
use printpdf::{IndirectFontRef, Mm, PdfLayerReference};

// ============================================================================
// Truncation Budgets
// ============================================================================

/// Maximum characters printed per fixed-size field.
///
/// Box fields get `full_row_field` scaled by their share of the row, so a
/// half-width box holds half as many characters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBudget {
    pub full_row_field: usize,
    pub crew_name: usize,
    pub crew_license: usize,
    pub crew_role: usize,
    pub crew_depth: usize,
    pub crew_time: usize,
    pub crew_elapsed: usize,
    pub weather_notes: usize,
    pub signature_caption: usize,
}

pub const COMPACT_BUDGET: TextBudget = TextBudget {
    full_row_field: 96,
    crew_name: 26,
    crew_license: 12,
    crew_role: 15,
    crew_depth: 6,
    crew_time: 5,
    crew_elapsed: 9,
    weather_notes: 60,
    signature_caption: 40,
};

pub const PAGINATED_BUDGET: TextBudget = TextBudget {
    full_row_field: 80,
    crew_name: 22,
    crew_license: 11,
    crew_role: 13,
    crew_depth: 6,
    crew_time: 5,
    crew_elapsed: 8,
    weather_notes: 48,
    signature_caption: 34,
};

impl TextBudget {
    pub fn for_mode(mode: LayoutMode) -> Self {
        match mode {
            LayoutMode::Compact => COMPACT_BUDGET,
            LayoutMode::Paginated => PAGINATED_BUDGET,
        }
    }

    pub fn field(&self, width_ratio: f32) -> usize {
        ((self.full_row_field as f32 * width_ratio).floor() as usize).max(4)
    }

    pub fn crew(&self, kind: CrewColumnKind) -> usize {
        match kind {
            CrewColumnKind::Number => 2,
            CrewColumnKind::Name => self.crew_name,
            CrewColumnKind::License => self.crew_license,
            CrewColumnKind::Role => self.crew_role,
            CrewColumnKind::StandardDepth | CrewColumnKind::WorkingDepth => self.crew_depth,
            CrewColumnKind::Start | CrewColumnKind::End => self.crew_time,
            CrewColumnKind::Elapsed => self.crew_elapsed,
        }
    }
}

/// Cut `text` to `budget` characters, marking the cut with `...`.
pub fn truncate(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let keep = budget.saturating_sub(3);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("...");
    cut
}

// ============================================================================
// Renderer
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorRenderer;

impl Renderer for VectorRenderer {
    fn backend(&self) -> Backend {
        Backend::Vector
    }

    async fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError> {
        self.draw(ctx)
    }
}

impl VectorRenderer {
    fn draw(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError> {
        let geometry = ctx.geometry;
        let plans = geometry.page_plans();
        let (doc, layers, fonts) = pdf::new_document("Bitácora de buceo", &geometry, plans.len())?;
        let table = ctx.crew_table();
        let mut warnings = base_warnings(ctx);
        let mut pages = Vec::with_capacity(plans.len());

        for (plan, layer) in plans.iter().zip(layers.iter()) {
            let mut pen = Pen::new(layer, &fonts, geometry);
            for region in &plan.regions {
                pen.summary.enter(*region);
                draw_region(&mut pen, *region, ctx, plan, &table);
                if pen.overflowed() && *region != Region::Footer {
                    log::warn!(
                        "Vector layout: {:?} overflows page {}",
                        region, plan.index + 1
                    );
                    warnings.push(RenderWarning::RegionOverflow {
                        page: plan.index,
                        region: *region,
                    });
                }
            }
            log::debug!(
                "Vector page {} drawn ({} regions)",
                plan.index + 1, plan.regions.len()
            );
            pages.push(pen.summary);
        }

        let bytes = pdf::save(doc)?;
        log::info!(
            "Vector render of {} finished: {} page(s)",
            ctx.view.filename, pages.len()
        );

        Ok(RenderedDocument {
            backend: Backend::Vector,
            filename: ctx.view.filename.clone(),
            bytes,
            pages,
            warnings,
        })
    }
}

// ============================================================================
// Pen: cursor state over one page
// ============================================================================

struct Pen<'a> {
    layer: &'a PdfLayerReference,
    fonts: &'a Fonts,
    geometry: LayoutGeometry,
    metrics: Metrics,
    budget: TextBudget,
    /// Top of the next region, measured from the bottom edge.
    y: f32,
    summary: PageSummary,
}

impl<'a> Pen<'a> {
    fn new(layer: &'a PdfLayerReference, fonts: &'a Fonts, geometry: LayoutGeometry) -> Self {
        Self {
            layer,
            fonts,
            geometry,
            metrics: geometry.metrics(),
            budget: TextBudget::for_mode(geometry.mode),
            y: geometry.content_top(),
            summary: PageSummary::default(),
        }
    }

    fn left(&self) -> f32 {
        self.geometry.content_left()
    }

    fn width(&self) -> f32 {
        self.geometry.content_width()
    }

    /// Space reserved at the bottom for the footer.
    fn floor(&self) -> f32 {
        self.geometry.content_bottom()
            + self.geometry.region_height(Region::Footer, 0).base()
            + REGION_GAP_MM
    }

    fn overflowed(&self) -> bool {
        self.y + REGION_GAP_MM < self.floor()
    }

    fn advance(&mut self, height: f32) {
        self.y -= height + REGION_GAP_MM;
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.fonts.bold
        } else {
            &self.fonts.regular
        }
    }

    /// Text with its baseline at `y`; x is kept inside the content width.
    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, bold: bool) {
        if text.is_empty() {
            return;
        }
        let x = x.clamp(self.left(), self.geometry.content_right());
        let font = self.font(bold);
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
        self.summary.text(text);
    }

    fn text_right(&mut self, text: &str, right: f32, y: f32, size: f32, bold: bool) {
        let x = right - text_width_mm(text, size);
        self.text(text, x, y, size, bold);
    }

    /// Gray bar with a bold title; returns its height.
    fn section_title(&mut self, title: &str) -> f32 {
        let h = self.metrics.section_title_mm;
        pdf::fill_rect(self.layer, self.left(), self.y, self.width(), h, 0.88);
        pdf::set_stroke(self.layer, 0.0, 0.5);
        pdf::stroke_rect(self.layer, self.left(), self.y, self.width(), h);
        let baseline = self.y - h / 2.0 - self.metrics.section_pt * PT_TO_MM / 2.5;
        let size = self.metrics.section_pt;
        self.text(title, self.left() + 2.0, baseline, size, true);
        h
    }

    /// Bordered box with a small label on top and the value under it.
    fn field_box(&mut self, x: f32, top: f32, width: f32, height: f32, field: &Field) {
        pdf::set_stroke(self.layer, 0.0, 0.4);
        pdf::stroke_rect(self.layer, x, top, width, height);

        let label_y = top - self.metrics.label_pt * PT_TO_MM - 1.0;
        let value_y = top - height + 1.8;
        let label_size = self.metrics.label_pt;
        let value_size = self.metrics.value_pt;
        self.text(field.label, x + 1.5, label_y, label_size, true);

        match &field.value {
            FieldValue::Text(value) => {
                let value = truncate(value, self.budget.field(field.width_ratio));
                self.text(&value, x + 1.5, value_y, value_size, false);
            }
            FieldValue::Choice {
                options,
                marks,
                notes,
            } => {
                let box_size = 2.8;
                let mut cx = x + 1.5;
                let keys = FieldValue::choice_keys(field.label, options);
                let marks = [marks.first, marks.second];
                for ((option, checked), key) in options.iter().zip(marks).zip(keys) {
                    self.checkbox(key, cx, value_y - 0.4, box_size, checked);
                    cx += box_size + 1.2;
                    self.text(option, cx, value_y, value_size, false);
                    cx += text_width_mm(option, value_size) + 4.0;
                }
                let notes = truncate(notes, self.budget.weather_notes);
                self.text(&notes, cx + 2.0, value_y, value_size, false);
            }
        }
    }

    fn checkbox(&mut self, key: String, x: f32, y: f32, size: f32, checked: bool) {
        pdf::draw_checkbox(self.layer, x, y, size, checked);
        self.summary.check(key, checked);
    }

    fn field_row(&mut self, fields: &[Field], height: f32) {
        let mut x = self.left();
        let top = self.y;
        for field in fields {
            let width = self.width() * field.width_ratio;
            self.field_box(x, top, width, height, field);
            x += width;
        }
        self.y -= height;
    }
}

// ============================================================================
// Regions
// ============================================================================

fn draw_region(
    pen: &mut Pen<'_>,
    region: Region,
    ctx: &RenderContext<'_>,
    plan: &PagePlan,
    table: &CrewTable,
) {
    let rows = plan.crew_rows.len();
    let height = pen.geometry.region_height(region, rows);
    match region {
        Region::Header => draw_header(pen, ctx, plan, height.base()),
        Region::MetaBox => draw_meta(pen, ctx, height.base()),
        Region::GeneralData => draw_general(pen, ctx),
        Region::CrewTable => draw_crew(pen, table, plan),
        Region::DiverNarratives => draw_narratives(pen, ctx, height.base()),
        Region::Observations => draw_observations(pen, ctx, height.base()),
        Region::Signatures => draw_signatures(pen, ctx, height.base()),
        Region::Footer => draw_footer(pen, ctx, plan),
    }
}

fn draw_header(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, plan: &PagePlan, height: f32) {
    let [title, subtitle, folio] = form::header_lines(ctx.view, plan);
    let m = pen.metrics;
    let top = pen.y;
    let right = pen.geometry.content_right();

    let title_y = top - m.title_pt * PT_TO_MM;
    pen.text(&title, pen.left(), title_y, m.title_pt, true);
    let subtitle_y = title_y - m.line_mm - 0.5;
    pen.text(&subtitle, pen.left(), subtitle_y, m.small_pt + 1.0, false);
    pen.text_right(&folio, right, title_y, m.value_pt, true);

    pdf::set_stroke(pen.layer, 0.0, 0.8);
    pdf::draw_line(pen.layer, pen.left(), top - height, right, top - height);
    pen.advance(height);
}

fn draw_meta(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, height: f32) {
    let fields = form::meta_fields(ctx.view);
    pen.field_row(&fields, height);
    pen.advance(0.0);
}

fn draw_general(pen: &mut Pen<'_>, ctx: &RenderContext<'_>) {
    let title_h = pen.section_title(Region::GeneralData.title());
    pen.y -= title_h;
    let row_h = pen.metrics.field_row_mm;
    for row in form::general_rows(ctx.view) {
        pen.field_row(&row, row_h);
    }
    pen.advance(0.0);
}

fn draw_crew(pen: &mut Pen<'_>, table: &CrewTable, plan: &PagePlan) {
    let heading = CrewTablePolicy::heading(Region::CrewTable.title(), plan.continuation);
    let title_h = pen.section_title(&heading);
    pen.y -= title_h;

    let m = pen.metrics;
    let widths = CrewTable::column_widths(pen.width());

    // Header row
    let top = pen.y;
    let mut x = pen.left();
    for (column, width) in CREW_COLUMNS.iter().zip(widths) {
        pdf::set_stroke(pen.layer, 0.0, 0.4);
        pdf::stroke_rect(pen.layer, x, top, width, m.crew_header_mm);
        let label_y = top - m.label_pt * PT_TO_MM - 1.2;
        pen.text(column.header, x + 1.0, label_y, m.label_pt, true);
        if column.kind == CrewColumnKind::StandardDepth {
            let sub_y = top - m.crew_header_mm + 1.5;
            pen.text(DEPTH_YES, x + 1.5, sub_y, m.label_pt, true);
            pen.text(DEPTH_NO, x + width / 2.0 + 1.0, sub_y, m.label_pt, true);
        }
        x += width;
    }
    pen.y -= m.crew_header_mm;

    for row in table.rows_in(plan.crew_rows.clone()) {
        draw_crew_row(pen, row, &widths);
    }
    pen.advance(0.0);
}

fn draw_crew_row(pen: &mut Pen<'_>, row: &CrewRow, widths: &[f32; 9]) {
    let m = pen.metrics;
    let top = pen.y;
    let text_y = top - m.crew_row_mm / 2.0 - m.value_pt * PT_TO_MM / 2.5;
    let mut x = pen.left();

    for (column, width) in CREW_COLUMNS.iter().zip(widths.iter().copied()) {
        pdf::set_stroke(pen.layer, 0.0, 0.3);
        pdf::stroke_rect(pen.layer, x, top, width, m.crew_row_mm);

        if column.kind == CrewColumnKind::StandardDepth {
            draw_depth_pair(pen, row, x, width, top);
        } else {
            let text = truncate(&row.text(column.kind), pen.budget.crew(column.kind));
            let bold = column.kind == CrewColumnKind::Number;
            pen.text(&text, x + 1.0, text_y, m.value_pt, bold);
        }
        x += width;
    }
    pen.y -= m.crew_row_mm;
}

fn draw_depth_pair(pen: &mut Pen<'_>, row: &CrewRow, x: f32, width: f32, top: f32) {
    let size = (pen.metrics.crew_row_mm * 0.45).min(3.2);
    let y = top - pen.metrics.crew_row_mm / 2.0 - size / 2.0;
    let marks = row.depth_marks();
    let [yes, no] = row.depth_keys();
    let yes_x = x + width / 4.0 - size / 2.0;
    pen.checkbox(yes, yes_x, y, size, marks.first);
    pen.checkbox(no, yes_x + width / 2.0, y, size, marks.second);
}

fn draw_narratives(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, min_height: f32) {
    let top = pen.y;
    let title_h = pen.section_title(Region::DiverNarratives.title());
    let m = pen.metrics;
    let inner_width = pen.width() - 4.0;
    let mut y = top - title_h - m.line_mm;

    let items = form::narratives(ctx.view);
    if items.is_empty() {
        pen.text(form::NO_NARRATIVES, pen.left() + 2.0, y, m.value_pt, false);
        y -= m.line_mm;
    }
    for item in items {
        pen.text(&item.heading, pen.left() + 2.0, y, m.value_pt, true);
        y -= m.line_mm;
        for line in wrap_text(&item.body, inner_width, m.value_pt) {
            pen.text(&line, pen.left() + 4.0, y, m.value_pt, false);
            y -= m.line_mm;
        }
    }

    let height = (top - y).max(min_height);
    pdf::set_stroke(pen.layer, 0.0, 0.5);
    pdf::stroke_rect(pen.layer, pen.left(), top, pen.width(), height);
    pen.y = top;
    pen.advance(height);
}

fn draw_observations(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, min_height: f32) {
    let top = pen.y;
    let title_h = pen.section_title(Region::Observations.title());
    let m = pen.metrics;
    let mut y = top - title_h - m.line_mm;

    for line in wrap_text(&ctx.view.observations, pen.width() - 4.0, m.value_pt) {
        pen.text(&line, pen.left() + 2.0, y, m.value_pt, false);
        y -= m.line_mm;
    }

    let height = (top - y).max(min_height);
    pdf::set_stroke(pen.layer, 0.0, 0.5);
    pdf::stroke_rect(pen.layer, pen.left(), top, pen.width(), height);
    pen.y = top;
    pen.advance(height);
}

fn draw_signatures(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, height: f32) {
    let m = pen.metrics;
    let top = pen.y;
    let gap = 4.0;
    let box_w = (pen.width() - gap) / 2.0;
    let caption_h = 2.0 * m.line_mm + 2.0;
    let sign_line_y = top - height + caption_h;

    for (i, (title, name)) in form::signature_captions(ctx.view).into_iter().enumerate() {
        let x = pen.left() + i as f32 * (box_w + gap);
        pdf::set_stroke(pen.layer, 0.0, 0.5);
        pdf::stroke_rect(pen.layer, x, top, box_w, height);
        pdf::set_stroke(pen.layer, 0.3, 0.3);
        let (line_left, line_right) = (x + 4.0, x + box_w - 4.0);
        pdf::draw_line(pen.layer, line_left, sign_line_y, line_right, sign_line_y);

        let area_top = top - 2.0;
        let area_bottom = sign_line_y + 1.0;
        if i == 0 {
            draw_supervisor_signature(pen, ctx, x, box_w, area_top, area_bottom);
        } else {
            let label = signature::PLACEHOLDER_LABEL;
            let label_x = x + box_w / 2.0 - text_width_mm(label, m.value_pt) / 2.0;
            let label_y = (area_top + area_bottom) / 2.0;
            pen.text(label, label_x, label_y, m.value_pt, false);
        }

        let caption_pt = m.label_pt + 0.5;
        let name = truncate(&name, pen.budget.signature_caption);
        let name_y = sign_line_y - 2.0 * m.line_mm;
        pen.text(title, x + 4.0, sign_line_y - m.line_mm, caption_pt, true);
        pen.text(&name, x + 4.0, name_y, caption_pt, false);
    }

    pen.advance(height);
}

fn draw_supervisor_signature(
    pen: &mut Pen<'_>,
    ctx: &RenderContext<'_>,
    x: f32,
    box_w: f32,
    top: f32,
    bottom: f32,
) {
    let m = pen.metrics;
    let resolved = &ctx.signature;

    match &resolved.block {
        SignatureBlock::Placeholder { label } => {
            let label_x = x + box_w / 2.0 - text_width_mm(label, m.value_pt) / 2.0;
            pen.text(label, label_x, (top + bottom) / 2.0, m.value_pt, false);
        }
        SignatureBlock::Signed { .. } => {
            let qr_size = signature::STAMP_QR_MM.min(top - bottom);
            let image_w = (box_w - qr_size - 8.0).min(signature::SIGNATURE_BOX_WIDTH_MM);
            let image_h = (top - bottom).min(signature::SIGNATURE_BOX_HEIGHT_MM);

            match &resolved.image {
                Some(image) => {
                    let (w, h) =
                        signature::fit_within(image.width(), image.height(), image_w, image_h);
                    pdf::embed_rgb(pen.layer, image, x + 3.0, top - h, w);
                }
                None => {
                    let label = signature::IMAGE_UNAVAILABLE_LABEL;
                    let label_y = (top + bottom) / 2.0;
                    pen.text(label, x + 3.0, label_y, m.small_pt, false);
                }
            }

            let stamp_x = x + box_w - qr_size - 3.0;
            if let Some(qr) = &resolved.qr {
                pdf::embed_gray(pen.layer, qr, stamp_x, top - qr_size, qr_size);
            }
            let mut y = top - qr_size - m.small_pt * PT_TO_MM - 0.5;
            for line in resolved.block.stamp_lines() {
                pen.text_right(&line, x + box_w - 2.0, y, m.small_pt, true);
                y -= m.small_pt * PT_TO_MM + 0.8;
            }
        }
    }
}

fn draw_footer(pen: &mut Pen<'_>, ctx: &RenderContext<'_>, plan: &PagePlan) {
    let m = pen.metrics;
    let bottom = pen.geometry.content_bottom();
    let height = pen.geometry.region_height(Region::Footer, 0).base();
    let top = bottom + height;

    let right = pen.geometry.content_right();
    pdf::set_stroke(pen.layer, 0.5, 0.3);
    pdf::draw_line(pen.layer, pen.left(), top, right, top);
    let y = bottom + 1.0;
    let folio = format!("Folio {}", ctx.view.short_id);
    pen.text(&folio, pen.left(), y, m.small_pt, false);
    pen.text_right(&plan.footer_label(), right, y, m.small_pt, false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Ana", 10), "Ana");
        assert_eq!(truncate("Bernardita Ignacia", 10), "Bernard...");
        assert_eq!(truncate("Bernardita Ignacia", 10).chars().count(), 10);
        assert_eq!(truncate("Ñandú Ñandú", 6), "Ñan...");
    }

    #[test]
    fn test_field_budget_scales_with_width() {
        let budget = COMPACT_BUDGET;
        assert_eq!(budget.field(1.0), 96);
        assert_eq!(budget.field(0.5), 48);
        assert_eq!(budget.field(0.01), 4);
    }

    /// Helvetica advance widths (1/1000 em) from the standard AFM.
    fn helvetica_advance(c: char) -> u32 {
        match c {
            ' ' | '.' | ',' | ':' | 'f' | 't' | 'I' | 'í' => 278,
            '-' | 'r' => 333,
            'i' | 'j' | 'l' => 222,
            'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500,
            '0'..='9' | 'L' => 556,
            'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 556,
            'á' | 'é' | 'ñ' | 'ó' | 'ú' => 556,
            'F' | 'T' | 'Z' => 611,
            'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
            'C' | 'D' | 'H' | 'N' | 'R' | 'U' | 'w' => 722,
            'G' | 'O' | 'Q' => 778,
            'm' | 'M' => 833,
            'W' => 944,
            _ => 1000,
        }
    }

    fn measured_width_mm(text: &str, size_pt: f32) -> f32 {
        let em: u32 = text.chars().map(helvetica_advance).sum();
        em as f32 / 1000.0 * size_pt * PT_TO_MM
    }

    #[test]
    fn test_truncated_crew_cells_fit_columns() {
        let samples = [
            (CrewColumnKind::Name, "Bernardita Fernández Gómez Rojas"),
            (CrewColumnKind::License, "BC-2024-009817"),
            (CrewColumnKind::Role, "Buzo emergencia"),
            (CrewColumnKind::WorkingDepth, "18,5 m"),
            (CrewColumnKind::Start, "09:45"),
            (CrewColumnKind::End, "13:40"),
            (CrewColumnKind::Elapsed, "1 h 45 min"),
        ];
        for mode in [LayoutMode::Compact, LayoutMode::Paginated] {
            let geometry = LayoutGeometry::new(mode);
            let budget = TextBudget::for_mode(mode);
            let widths = CrewTable::column_widths(geometry.content_width());
            for (kind, sample) in samples {
                let column = CREW_COLUMNS.iter().position(|c| c.kind == kind).unwrap();
                let shown = truncate(sample, budget.crew(kind));
                // Cell text starts 1 mm in from the left border.
                let available = widths[column] - 1.0;
                let needed = measured_width_mm(&shown, geometry.metrics().value_pt);
                assert!(needed <= available, "{:?} in {:?}: {:?}", kind, mode, shown);
            }
        }
    }
}
