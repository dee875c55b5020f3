//! Tree-to-pages compositor: measures the node tree, then paints it onto
//! PDF pages as real text so the output stays searchable.

use super::tree::{Align, BoxStyle, DocumentTree, ImageData, Node, PageNode, TextStyle};
use crate::error::RenderWarning;
use crate::geometry::{
    text_width_mm, wrap_text, LayoutGeometry, Region, RegionHeight, PT_TO_MM, REGION_GAP_MM,
};
use crate::render::pdf::{self, Fonts};
use crate::render::PageSummary;
use crate::signature;
use printpdf::{Mm, PdfLayerReference};

const LINE_SPACING: f32 = 1.3;
const RULE_MM: f32 = 0.6;

fn line_height(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * LINE_SPACING
}

fn text_lines(content: &str, style: &TextStyle, width: f32) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    wrap_text(content, (width - style.indent_mm).max(1.0), style.size_pt)
}

fn fitted_image(data: &ImageData, max_width: f32, max_height: f32, available: f32) -> (f32, f32) {
    let (w, h) = data.dimensions();
    signature::fit_within(w, h, max_width.min(available), max_height)
}

// ============================================================================
// Measure
// ============================================================================

/// Height of `node` laid out `width` mm wide.
pub fn measure(node: &Node, width: f32) -> f32 {
    match node {
        Node::Section {
            height,
            style,
            children,
            ..
        } => {
            let content = padded_height(style, children, width);
            section_height(*height, content).max(style.min_height_mm)
        }
        Node::Row { style, children } => {
            let inner = width - 2.0 * style.padding_mm;
            let tallest = children
                .iter()
                .map(|child| measure(child, column_width(child, inner)))
                .fold(0.0_f32, f32::max);
            (tallest + 2.0 * style.padding_mm).max(style.min_height_mm)
        }
        Node::Column { style, children, .. } => {
            padded_height(style, children, width).max(style.min_height_mm)
        }
        Node::Text { content, style } => {
            text_lines(content, style, width).len() as f32 * line_height(style.size_pt)
        }
        Node::Image {
            data,
            max_width_mm,
            max_height_mm,
            ..
        } => fitted_image(data, *max_width_mm, *max_height_mm, width).1,
        Node::Checkbox { size_pt, .. } => line_height(*size_pt),
        Node::Rule => RULE_MM,
        Node::Spacer { height_mm } => *height_mm,
    }
}

/// Fixed regions grow instead of clipping; text is never dropped.
fn section_height(policy: RegionHeight, content: f32) -> f32 {
    match policy {
        RegionHeight::Fixed(h) => {
            if content > h {
                log::debug!("Fixed region grows from {:.1} to {:.1} mm", h, content);
            }
            h.max(content)
        }
        RegionHeight::AtLeast(_) => policy.resolve(content),
    }
}

fn padded_height(style: &BoxStyle, children: &[Node], width: f32) -> f32 {
    let pad = style.padding_mm;
    let content: f32 = children.iter().map(|c| measure(c, width - 2.0 * pad)).sum();
    content + 2.0 * pad
}

fn column_width(node: &Node, row_width: f32) -> f32 {
    match node {
        Node::Column { width_ratio, .. } => row_width * width_ratio,
        _ => row_width,
    }
}

// ============================================================================
// Paint
// ============================================================================

pub struct Compositor<'a> {
    geometry: LayoutGeometry,
    layer: &'a PdfLayerReference,
    fonts: &'a Fonts,
    summary: PageSummary,
}

impl<'a> Compositor<'a> {
    pub fn new(geometry: LayoutGeometry, layer: &'a PdfLayerReference, fonts: &'a Fonts) -> Self {
        Self {
            geometry,
            layer,
            fonts,
            summary: PageSummary::default(),
        }
    }

    /// Paint one page; returns its summary and any overflowed regions.
    pub fn paint_page(mut self, page: &PageNode) -> (PageSummary, Vec<RenderWarning>) {
        let g = self.geometry;
        let x = g.content_left();
        let width = g.content_width();
        let pinned: f32 = page
            .sections
            .iter()
            .filter(|s| matches!(s, Node::Section { pin_bottom: true, .. }))
            .map(|s| measure(s, width) + REGION_GAP_MM)
            .sum();
        let floor = g.content_bottom() + pinned;

        let mut warnings = Vec::new();
        let mut cursor = g.content_top();

        for section in &page.sections {
            let height = measure(section, width);
            let pin_bottom = matches!(section, Node::Section { pin_bottom: true, .. });
            let top = if pin_bottom {
                g.content_bottom() + height
            } else {
                cursor
            };

            self.paint(section, x, top, width, height);

            if !pin_bottom {
                cursor -= height + REGION_GAP_MM;
                if cursor + REGION_GAP_MM < floor {
                    if let Node::Section { region, .. } = section {
                        log::warn!(
                            "Declarative layout: {:?} overflows page {}",
                            region, page.plan.index + 1
                        );
                        warnings.push(RenderWarning::RegionOverflow {
                            page: page.plan.index,
                            region: *region,
                        });
                    }
                }
            }
        }

        (self.summary, warnings)
    }

    fn paint(&mut self, node: &Node, x: f32, top: f32, width: f32, height: f32) {
        match node {
            Node::Section {
                region,
                style,
                children,
                ..
            } => {
                self.summary.enter(*region);
                self.paint_box(style, x, top, width, height);
                self.paint_stack(style, children, x, top, width);
            }
            Node::Row { style, children } => {
                self.paint_box(style, x, top, width, height);
                let inner = width - 2.0 * style.padding_mm;
                let inner_h = height - 2.0 * style.padding_mm;
                let mut col_x = x + style.padding_mm;
                for child in children {
                    let w = column_width(child, inner);
                    self.paint(child, col_x, top - style.padding_mm, w, inner_h);
                    col_x += w;
                }
            }
            Node::Column { style, children, .. } => {
                self.paint_box(style, x, top, width, height);
                self.paint_stack(style, children, x, top, width);
            }
            Node::Text { content, style } => self.paint_text(content, style, x, top, width),
            Node::Image {
                data,
                max_width_mm,
                max_height_mm,
                align,
            } => {
                let (w, h) = fitted_image(data, *max_width_mm, *max_height_mm, width);
                let img_x = aligned_x(*align, x, width, w);
                match data {
                    ImageData::Rgb(img) => pdf::embed_rgb(self.layer, img, img_x, top - h, w),
                    ImageData::Gray(img) => pdf::embed_gray(self.layer, img, img_x, top - h, w),
                }
            }
            Node::Checkbox {
                key,
                checked,
                label,
                size_pt,
            } => {
                let size = size_pt * PT_TO_MM * 0.85;
                let line_h = line_height(*size_pt);
                let box_x = if label.is_empty() {
                    x + width / 2.0 - size / 2.0
                } else {
                    x
                };
                pdf::draw_checkbox(self.layer, box_x, top - line_h + 0.6, size, *checked);
                self.summary.check(key.clone(), *checked);
                if !label.is_empty() {
                    let baseline = top - size_pt * PT_TO_MM;
                    self.emit_text(label, x + size + 1.2, baseline, *size_pt, false);
                }
            }
            Node::Rule => {
                pdf::set_stroke(self.layer, 0.3, 0.3);
                let mid = top - RULE_MM / 2.0;
                pdf::draw_line(self.layer, x, mid, x + width, mid);
            }
            Node::Spacer { .. } => {}
        }
    }

    fn paint_stack(&mut self, style: &BoxStyle, children: &[Node], x: f32, top: f32, width: f32) {
        let pad = style.padding_mm;
        let inner = width - 2.0 * pad;
        let mut y = top - pad;
        for child in children {
            let h = measure(child, inner);
            self.paint(child, x + pad, y, inner, h);
            y -= h;
        }
    }

    fn paint_box(&mut self, style: &BoxStyle, x: f32, top: f32, width: f32, height: f32) {
        if let Some(gray) = style.fill {
            pdf::fill_rect(self.layer, x, top, width, height, gray);
        }
        if style.border {
            pdf::set_stroke(self.layer, 0.0, 0.4);
            pdf::stroke_rect(self.layer, x, top, width, height);
        }
        if style.rule_below {
            pdf::set_stroke(self.layer, 0.0, 0.8);
            pdf::draw_line(self.layer, x, top - height, x + width, top - height);
        }
    }

    fn paint_text(&mut self, content: &str, style: &TextStyle, x: f32, top: f32, width: f32) {
        let line_h = line_height(style.size_pt);
        let mut baseline = top - style.size_pt * PT_TO_MM;
        for line in text_lines(content, style, width) {
            let w = text_width_mm(&line, style.size_pt);
            let line_x = aligned_x(style.align, x + style.indent_mm, width - style.indent_mm, w);
            self.emit_text(&line, line_x, baseline, style.size_pt, style.bold);
            baseline -= line_h;
        }
    }

    fn emit_text(&mut self, text: &str, x: f32, baseline: f32, size_pt: f32, bold: bool) {
        let font = if bold {
            &self.fonts.bold
        } else {
            &self.fonts.regular
        };
        let x = x.clamp(self.geometry.content_left(), self.geometry.content_right());
        let layer = self.layer;
        layer.use_text(text, size_pt, Mm(x), Mm(baseline), font);
        self.summary.text(text);
    }
}

fn aligned_x(align: Align, x: f32, width: f32, content_width: f32) -> f32 {
    match align {
        Align::Left => x,
        Align::Center => x + (width - content_width).max(0.0) / 2.0,
        Align::Right => x + (width - content_width).max(0.0),
    }
}

/// Regions in paint order, for checking a tree against its page plan.
pub fn section_order(tree: &DocumentTree) -> Vec<Vec<Region>> {
    tree.pages
        .iter()
        .map(|page| {
            page.sections
                .iter()
                .filter_map(|s| match s {
                    Node::Section { region, .. } => Some(*region),
                    _ => None,
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;

    fn para(content: &str) -> Node {
        Node::Text {
            content: content.to_string(),
            style: TextStyle::regular(10.0),
        }
    }

    #[test]
    fn test_text_height_grows_with_wrapping() {
        let short = measure(&para("Inspección"), 100.0);
        let long = measure(&para(&"Inspección de redes ".repeat(20)), 100.0);
        assert!(long > short * 3.0);
        assert_eq!(measure(&para(""), 100.0), 0.0);
    }

    #[test]
    fn test_row_takes_tallest_column() {
        let row = Node::Row {
            style: BoxStyle::default(),
            children: vec![
                Node::Column {
                    width_ratio: 0.5,
                    style: BoxStyle::default(),
                    children: vec![para("a")],
                },
                Node::Column {
                    width_ratio: 0.5,
                    style: BoxStyle {
                        min_height_mm: 20.0,
                        ..BoxStyle::default()
                    },
                    children: vec![para("b")],
                },
            ],
        };
        assert_eq!(measure(&row, 100.0), 20.0);
    }

    #[test]
    fn test_growable_section_respects_minimum() {
        let section = Node::Section {
            region: Region::Observations,
            height: RegionHeight::AtLeast(30.0),
            pin_bottom: false,
            style: BoxStyle::default(),
            children: vec![para("corto")],
        };
        assert_eq!(measure(&section, 150.0), 30.0);

        let long = Node::Section {
            region: Region::Observations,
            height: RegionHeight::AtLeast(30.0),
            pin_bottom: false,
            style: BoxStyle::default(),
            children: vec![para(&"texto largo ".repeat(200))],
        };
        assert!(measure(&long, 150.0) > 30.0);
    }

    #[test]
    fn test_aligned_x() {
        assert_eq!(aligned_x(Align::Left, 10.0, 50.0, 20.0), 10.0);
        assert_eq!(aligned_x(Align::Center, 10.0, 50.0, 20.0), 25.0);
        assert_eq!(aligned_x(Align::Right, 10.0, 50.0, 20.0), 40.0);
        assert_eq!(aligned_x(Align::Right, 10.0, 10.0, 20.0), 10.0);
    }
}
