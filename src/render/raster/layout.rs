//! Lays a mounted component tree out into a flat display list.
//!
//! Coordinates are CSS pixels with the origin at the top-left corner of the
//! host; page `i` starts at `i * page height`.

use super::component::{Component, Frame, Picture, TextAlign, CSS_PX_PER_MM};
use crate::geometry::{text_width_mm, wrap_text, Region, RegionHeight};
use crate::render::PageSummary;

const LINE_SPACING: f32 = 1.3;
const DIVIDER_PX: f32 = 2.0;

#[derive(Debug, Clone)]
pub enum DrawOp {
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        gray: u8,
    },
    Outline { x: f32, y: f32, w: f32, h: f32 },
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    /// `y` is the top of the line box.
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        bold: bool,
    },
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        picture: Picture,
    },
}

impl DrawOp {
    pub fn fill(x: f32, y: f32, w: f32, h: f32, gray: u8) -> Self {
        DrawOp::Fill { x, y, w, h, gray }
    }

    pub fn outline(x: f32, y: f32, w: f32, h: f32) -> Self {
        DrawOp::Outline { x, y, w, h }
    }

    pub fn line(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        DrawOp::Line { x1, y1, x2, y2 }
    }
}

/// Everything the host knows after a layout pass.
#[derive(Debug, Clone, Default)]
pub struct HostLayout {
    pub width: f32,
    pub height: f32,
    pub ops: Vec<DrawOp>,
    pub pages: Vec<PageSummary>,
    pub overflow: Vec<(usize, Region)>,
    /// Characters of visible text laid out so far.
    pub text_len: usize,
}

impl HostLayout {
    fn draw(&mut self, op: DrawOp) {
        self.ops.push(op);
    }
}

fn line_height(size: f32) -> f32 {
    size * LINE_SPACING
}

fn lines(text: &str, size: f32, width: f32) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    // wrap_text works in millimetres and points.
    wrap_text(text, (width / CSS_PX_PER_MM).max(0.5), size * 0.75)
}

fn text_width(text: &str, size: f32) -> f32 {
    text_width_mm(text, size * 0.75) * CSS_PX_PER_MM
}

fn picture_size(picture: &Picture, max_width: f32, max_height: f32, available: f32) -> (f32, f32) {
    let (w, h) = picture.dimensions();
    crate::signature::fit_within(w, h, max_width.min(available), max_height)
}

fn offset(align: TextAlign, x: f32, width: f32, content: f32) -> f32 {
    match align {
        TextAlign::Start => x,
        TextAlign::Center => x + (width - content).max(0.0) / 2.0,
        TextAlign::End => x + (width - content).max(0.0),
    }
}

fn pinned(component: &Component) -> bool {
    match component {
        Component::Region { pinned_bottom, .. } => *pinned_bottom,
        _ => false,
    }
}

// ============================================================================
// Measure
// ============================================================================

pub fn measure(component: &Component, width: f32) -> f32 {
    match component {
        Component::Page { height, .. } => *height,
        Component::Region {
            height,
            frame,
            children,
            ..
        } => {
            let content = framed(frame, children, width);
            match height {
                // A fixed region grows rather than clip its text.
                RegionHeight::Fixed(h) => h.max(content),
                RegionHeight::AtLeast(_) => height.resolve(content),
            }
        }
        Component::Stack { frame, children } => framed(frame, children, width),
        Component::Split { frame, children } => {
            let inner = width - 2.0 * frame.padding;
            let tallest = children
                .iter()
                .map(|(share, child)| measure(child, inner * share))
                .fold(0.0_f32, f32::max);
            (tallest + 2.0 * frame.padding).max(frame.min_height)
        }
        Component::Label { text, size, inset, .. } => {
            lines(text, *size, width - inset).len() as f32 * line_height(*size)
        }
        Component::Image {
            picture,
            max_width,
            max_height,
            ..
        } => picture_size(picture, *max_width, *max_height, width).1,
        Component::Tick { size, .. } => line_height(*size),
        Component::Divider => DIVIDER_PX,
        Component::Gap(h) => *h,
    }
}

fn framed(frame: &Frame, children: &[Component], width: f32) -> f32 {
    let inner = width - 2.0 * frame.padding;
    let content: f32 = children.iter().map(|c| measure(c, inner)).sum();
    (content + 2.0 * frame.padding).max(frame.min_height)
}

// ============================================================================
// Place
// ============================================================================

/// Lay out `pages` one below the other.
pub fn layout(pages: &[Component]) -> HostLayout {
    let mut out = HostLayout::default();
    for page in pages {
        if let Component::Page { width, .. } = page {
            out.width = out.width.max(*width);
        }
        let top = out.height;
        out.height += measure(page, out.width);
        place_page(page, top, &mut out);
    }
    out
}

fn place_page(page: &Component, top: f32, out: &mut HostLayout) {
    let Component::Page {
        index,
        width,
        height,
        margin,
        gap,
        children,
    } = page
    else {
        return;
    };
    out.draw(DrawOp::fill(0.0, top, *width, *height, 255));
    out.pages.push(PageSummary::default());

    let x = *margin;
    let inner = width - 2.0 * margin;
    let bottom = top + height - margin;
    let pinned_height: f32 = children
        .iter()
        .filter(|c| pinned(c))
        .map(|c| measure(c, inner) + gap)
        .sum();
    let floor = bottom - pinned_height;

    let mut cursor = top + margin;
    for child in children {
        let h = measure(child, inner);
        let pinned_bottom = pinned(child);
        let y = if pinned_bottom { bottom - h } else { cursor };

        place(child, x, y, inner, h, out);

        if !pinned_bottom {
            cursor += h + gap;
            if cursor - gap > floor {
                if let Component::Region { region, .. } = child {
                    log::warn!("Raster layout: {:?} overflows page {}", region, index + 1);
                    out.overflow.push((*index, *region));
                }
            }
        }
    }
}

fn place(component: &Component, x: f32, y: f32, width: f32, height: f32, out: &mut HostLayout) {
    match component {
        Component::Page { .. } => {}
        Component::Region {
            region,
            frame,
            children,
            ..
        } => {
            if let Some(page) = out.pages.last_mut() {
                page.enter(*region);
            }
            decorate(frame, x, y, width, height, out);
            place_column(children, frame, x, y, width, out);
        }
        Component::Stack { frame, children } => {
            decorate(frame, x, y, width, height, out);
            place_column(children, frame, x, y, width, out);
        }
        Component::Split { frame, children } => {
            decorate(frame, x, y, width, height, out);
            let inner = width - 2.0 * frame.padding;
            let inner_h = height - 2.0 * frame.padding;
            let mut cx = x + frame.padding;
            for (share, child) in children {
                let w = inner * share;
                place(child, cx, y + frame.padding, w, inner_h, out);
                cx += w;
            }
        }
        Component::Label {
            text,
            size,
            bold,
            align,
            inset,
        } => {
            let mut line_y = y;
            for line in lines(text, *size, width - inset) {
                let w = text_width(&line, *size);
                let lx = offset(*align, x + inset, width - inset, w);
                push_text(out, lx, line_y, line, *size, *bold);
                line_y += line_height(*size);
            }
        }
        Component::Image {
            picture,
            max_width,
            max_height,
            align,
        } => {
            let (w, h) = picture_size(picture, *max_width, *max_height, width);
            out.draw(DrawOp::Image {
                x: offset(*align, x, width, w),
                y,
                w,
                h,
                picture: picture.clone(),
            });
        }
        Component::Tick {
            key,
            checked,
            caption,
            size,
        } => {
            if let Some(page) = out.pages.last_mut() {
                page.check(key.clone(), *checked);
            }
            let side = size * 0.85;
            let bx = if caption.is_empty() {
                x + (width - side) / 2.0
            } else {
                x
            };
            let by = y + (line_height(*size) - side) / 2.0;
            out.draw(DrawOp::outline(bx, by, side, side));
            if *checked {
                let (near, far) = (side * 0.2, side * 0.8);
                out.draw(DrawOp::line(bx + near, by + near, bx + far, by + far));
                out.draw(DrawOp::line(bx + near, by + far, bx + far, by + near));
            }
            if !caption.is_empty() {
                push_text(out, bx + side + 4.0, y, caption.clone(), *size, false);
            }
        }
        Component::Divider => {
            let mid = y + DIVIDER_PX / 2.0;
            out.draw(DrawOp::line(x, mid, x + width, mid));
        }
        Component::Gap(_) => {}
    }
}

fn place_column(
    children: &[Component],
    frame: &Frame,
    x: f32,
    y: f32,
    width: f32,
    out: &mut HostLayout,
) {
    let inner = width - 2.0 * frame.padding;
    let mut cy = y + frame.padding;
    for child in children {
        let h = measure(child, inner);
        place(child, x + frame.padding, cy, inner, h, out);
        cy += h;
    }
}

fn decorate(frame: &Frame, x: f32, y: f32, width: f32, height: f32, out: &mut HostLayout) {
    if let Some(gray) = frame.background {
        out.draw(DrawOp::fill(x, y, width, height, gray));
    }
    if frame.border {
        out.draw(DrawOp::outline(x, y, width, height));
    }
    if frame.divider_below {
        out.draw(DrawOp::line(x, y + height, x + width, y + height));
    }
}

fn push_text(out: &mut HostLayout, x: f32, y: f32, text: String, size: f32, bold: bool) {
    out.text_len += text.chars().filter(|c| !c.is_whitespace()).count();
    if let Some(page) = out.pages.last_mut() {
        page.text(text.clone());
    }
    out.draw(DrawOp::Text {
        x,
        y,
        text,
        size,
        bold,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(text: &str) -> Component {
        Component::Label {
            text: text.to_string(),
            size: 12.0,
            bold: false,
            align: TextAlign::Start,
            inset: 0.0,
        }
    }

    fn page(index: usize, children: Vec<Component>) -> Component {
        Component::Page {
            index,
            width: 800.0,
            height: 1000.0,
            margin: 40.0,
            gap: 8.0,
            children,
        }
    }

    fn region(region: Region, min: f32, children: Vec<Component>) -> Component {
        Component::Region {
            region,
            height: RegionHeight::AtLeast(min),
            pinned_bottom: region == Region::Footer,
            frame: Frame::default(),
            children,
        }
    }

    #[test]
    fn test_pages_stack_vertically() {
        let host = layout(&[
            page(0, vec![region(Region::Header, 50.0, vec![label("uno")])]),
            page(1, vec![region(Region::Header, 50.0, vec![label("dos")])]),
        ]);
        assert_eq!(host.height, 2000.0);
        assert_eq!(host.pages.len(), 2);
        assert!(host.pages[1].contains_text("dos"));
        assert!(!host.pages[0].contains_text("dos"));
        assert_eq!(host.text_len, 6);
    }

    #[test]
    fn test_footer_pinned_to_page_bottom() {
        let host = layout(&[page(
            0,
            vec![
                region(Region::Header, 50.0, vec![label("cabecera")]),
                region(Region::Footer, 20.0, vec![label("pie")]),
            ],
        )]);
        let footer_y = host
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { text, y, .. } if text == "pie" => Some(*y),
                _ => None,
            })
            .unwrap();
        assert_eq!(footer_y, 1000.0 - 40.0 - 20.0);
        assert_eq!(host.pages[0].regions, vec![Region::Header, Region::Footer]);
    }

    #[test]
    fn test_overflow_reported() {
        let long = "palabra ".repeat(3000);
        let observations = region(Region::Observations, 50.0, vec![label(&long)]);
        let host = layout(&[page(0, vec![observations])]);
        assert_eq!(host.overflow, vec![(0, Region::Observations)]);
    }
}
