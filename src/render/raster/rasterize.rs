//! Paints a host layout into a bitmap and slices it into pages.

use super::component::Picture;
use super::layout::{DrawOp, HostLayout};
use ::image::{imageops, GrayImage, Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use std::fmt;
use std::sync::OnceLock;

const INK: Rgb<u8> = Rgb([0, 0, 0]);
const PAPER: u8 = 255;
/// A channel at or below this counts as ink in the blank check.
const INK_THRESHOLD: u8 = 245;

// ============================================================================
// Fonts
// ============================================================================

pub struct Glyphs {
    regular: Option<Font<'static>>,
    bold: Option<Font<'static>>,
}

impl fmt::Debug for Glyphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Glyphs")
            .field("regular", &self.regular.is_some())
            .field("bold", &self.bold.is_some())
            .finish()
    }
}

impl Glyphs {
    /// A face set with nothing in it; text runs are skipped.
    pub fn none() -> Self {
        Self {
            regular: None,
            bold: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none() && self.bold.is_none()
    }

    fn face(&self, bold: bool) -> Option<&Font<'static>> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }
    }
}

fn load_face(db: &fontdb::Database, weight: fontdb::Weight) -> Option<Font<'static>> {
    let query = fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        weight,
        ..fontdb::Query::default()
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| {
        Font::try_from_vec_and_index(data.to_vec(), index)
    })
    .flatten()
}

/// System sans-serif faces, loaded once per process.
pub fn glyphs() -> &'static Glyphs {
    static GLYPHS: OnceLock<Glyphs> = OnceLock::new();
    GLYPHS.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let glyphs = Glyphs {
            regular: load_face(&db, fontdb::Weight::NORMAL),
            bold: load_face(&db, fontdb::Weight::BOLD),
        };
        if glyphs.regular.is_none() {
            log::warn!("No sans-serif system font found; raster text will not be painted");
        }
        glyphs
    })
}

// ============================================================================
// Painting
// ============================================================================

/// A painted host bitmap.
pub struct Painted {
    pub image: RgbImage,
    /// Text runs laid out but not painted for lack of a face.
    pub skipped_text: usize,
}

/// Paint `host` at `scale` device pixels per CSS pixel.
pub fn paint(host: &HostLayout, scale: f32, glyphs: &Glyphs) -> Painted {
    let width = (host.width * scale).round().max(1.0) as u32;
    let height = (host.height * scale).round().max(1.0) as u32;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([PAPER; 3]));
    let stroke = scale.max(1.0);
    let mut skipped_text = 0;

    for op in &host.ops {
        match op {
            DrawOp::Fill { x, y, w, h, gray } => {
                let (x, y, w, h) = (x * scale, y * scale, w * scale, h * scale);
                fill(&mut canvas, x, y, w, h, Rgb([*gray; 3]));
            }
            DrawOp::Outline { x, y, w, h } => {
                let (x, y, w, h) = (x * scale, y * scale, w * scale, h * scale);
                fill(&mut canvas, x, y, w, stroke, INK);
                fill(&mut canvas, x, y + h - stroke, w, stroke, INK);
                fill(&mut canvas, x, y, stroke, h, INK);
                fill(&mut canvas, x + w - stroke, y, stroke, h, INK);
            }
            DrawOp::Line { x1, y1, x2, y2 } => {
                let (x1, y1) = (x1 * scale, y1 * scale);
                let (x2, y2) = (x2 * scale, y2 * scale);
                line(&mut canvas, x1, y1, x2, y2, stroke);
            }
            DrawOp::Text {
                x,
                y,
                text,
                size,
                bold,
            } => match glyphs.face(*bold) {
                Some(font) => text_run(&mut canvas, font, text, x * scale, y * scale, size * scale),
                None => skipped_text += 1,
            },
            DrawOp::Image {
                x,
                y,
                w,
                h,
                picture,
            } => {
                let (x, y, w, h) = (x * scale, y * scale, w * scale, h * scale);
                blit(&mut canvas, picture, x, y, w, h);
            }
        }
    }
    Painted {
        image: canvas,
        skipped_text,
    }
}

fn fill(canvas: &mut RgbImage, x: f32, y: f32, w: f32, h: f32, color: Rgb<u8>) {
    let (cw, ch) = canvas.dimensions();
    let x0 = x.max(0.0) as u32;
    let y0 = y.max(0.0) as u32;
    let x1 = ((x + w).ceil().max(0.0) as u32).min(cw);
    let y1 = ((y + h).ceil().max(0.0) as u32).min(ch);
    for py in y0..y1 {
        for px in x0..x1 {
            canvas.put_pixel(px, py, color);
        }
    }
}

fn line(canvas: &mut RgbImage, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32) {
    let steps = (x2 - x1).abs().max((y2 - y1).abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = x1 + (x2 - x1) * t;
        let y = y1 + (y2 - y1) * t;
        let half = thickness / 2.0;
        fill(canvas, x - half, y - half, thickness, thickness, INK);
    }
}

fn text_run(canvas: &mut RgbImage, font: &Font<'static>, text: &str, x: f32, top: f32, size: f32) {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let (cw, ch) = canvas.dimensions();

    for glyph in font.layout(text, scale, point(x, top + ascent)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = bb.min.x + gx as i32;
            let py = bb.min.y + gy as i32;
            if px < 0 || py < 0 || px as u32 >= cw || py as u32 >= ch {
                return;
            }
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            for channel in pixel.0.iter_mut() {
                let under = *channel as f32;
                *channel = (under * (1.0 - coverage)).round() as u8;
            }
        });
    }
}

fn blit(canvas: &mut RgbImage, picture: &Picture, x: f32, y: f32, w: f32, h: f32) {
    let (w, h) = (w.round() as u32, h.round() as u32);
    if w == 0 || h == 0 {
        return;
    }
    let scaled: RgbImage = match picture {
        Picture::Rgb(img) => imageops::resize(&**img, w, h, imageops::FilterType::Triangle),
        // Nearest keeps QR modules crisp.
        Picture::Gray(img) => {
            gray_to_rgb(&imageops::resize(&**img, w, h, imageops::FilterType::Nearest))
        }
    };
    imageops::overlay(canvas, &scaled, x.round() as i64, y.round() as i64);
}

fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let l = gray.get_pixel(x, y).0[0];
        Rgb([l, l, l])
    })
}

// ============================================================================
// Capture
// ============================================================================

/// Cut a tall capture into `pages` equal slices, top to bottom.
pub fn slice_pages(capture: &RgbImage, pages: usize) -> Vec<RgbImage> {
    if pages == 0 {
        return Vec::new();
    }
    let (width, height) = capture.dimensions();
    let page_height = height / pages as u32;
    (0..pages as u32)
        .map(|i| imageops::crop_imm(capture, 0, i * page_height, width, page_height).to_image())
        .collect()
}

/// True when the top-left quarter of the page holds no ink.
///
/// The header and meta box sit there on every page, so an empty corner
/// means the host was captured before it painted.
pub fn corner_is_blank(page: &RgbImage) -> bool {
    let (width, height) = page.dimensions();
    let (cw, ch) = (width / 2, height / 4);
    for y in (0..ch).step_by(2) {
        for x in (0..cw).step_by(2) {
            if page.get_pixel(x, y).0.iter().any(|c| *c <= INK_THRESHOLD) {
                return false;
            }
        }
    }
    true
}
