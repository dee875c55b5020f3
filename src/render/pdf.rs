//! printpdf plumbing shared by the backends that emit PDF.

use crate::error::RenderError;
use crate::geometry::LayoutGeometry;
use ::image::{GrayImage, RgbImage};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;
use std::io::{BufWriter, Cursor};

pub struct Fonts {
    pub regular: IndirectFontRef,
    pub bold: IndirectFontRef,
}

/// Document with `page_count` empty pages, one layer each.
pub fn new_document(
    title: &str,
    geometry: &LayoutGeometry,
    page_count: usize,
) -> Result<(PdfDocumentReference, Vec<PdfLayerReference>, Fonts), RenderError> {
    let width = Mm(geometry.page.width_mm);
    let height = Mm(geometry.page.height_mm);
    let (doc, page1, layer1) = PdfDocument::new(title, width, height, "Layer 1");

    let mut layers = vec![doc.get_page(page1).get_layer(layer1)];
    for _ in 1..page_count {
        let (page, layer) = doc.add_page(width, height, "Layer 1");
        layers.push(doc.get_page(page).get_layer(layer));
    }

    // Load built-in fonts
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::EncodingFailed(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::EncodingFailed(e.to_string()))?;

    Ok((doc, layers, Fonts { regular, bold }))
}

pub fn save(doc: PdfDocumentReference) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    {
        let mut writer = BufWriter::new(Cursor::new(&mut buf));
        doc.save(&mut writer)
            .map_err(|e| RenderError::EncodingFailed(e.to_string()))?;
    }
    Ok(buf)
}

// ============================================================================
// Drawing Utilities
// ============================================================================

pub fn set_stroke(layer: &PdfLayerReference, gray: f32, thickness: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(gray, gray, gray, None)));
    layer.set_outline_thickness(thickness);
}

fn set_text_color(layer: &PdfLayerReference, gray: f32) {
    layer.set_fill_color(Color::Rgb(Rgb::new(gray, gray, gray, None)));
}

pub fn draw_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    let points = vec![
        (Point::new(Mm(x1), Mm(y1)), false),
        (Point::new(Mm(x2), Mm(y2)), false),
    ];
    let line = Line {
        points,
        is_closed: false,
    };
    layer.add_line(line);
}

fn rect_points(x: f32, top: f32, width: f32, height: f32) -> Vec<(Point, bool)> {
    vec![
        (Point::new(Mm(x), Mm(top - height)), false),
        (Point::new(Mm(x + width), Mm(top - height)), false),
        (Point::new(Mm(x + width), Mm(top)), false),
        (Point::new(Mm(x), Mm(top)), false),
    ]
}

/// Outline of a box whose top-left corner is `(x, top)`.
pub fn stroke_rect(layer: &PdfLayerReference, x: f32, top: f32, width: f32, height: f32) {
    layer.add_line(Line {
        points: rect_points(x, top, width, height),
        is_closed: true,
    });
}

/// Solid gray box; leaves the fill color black for following text.
pub fn fill_rect(layer: &PdfLayerReference, x: f32, top: f32, width: f32, height: f32, gray: f32) {
    set_text_color(layer, gray);
    layer.add_polygon(Polygon {
        rings: vec![rect_points(x, top, width, height)],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
    set_text_color(layer, 0.0);
}

/// Square box with its lower-left corner at `(x, y)`; a cross when checked.
pub fn draw_checkbox(layer: &PdfLayerReference, x: f32, y: f32, size: f32, checked: bool) {
    set_stroke(layer, 0.0, 0.4);
    stroke_rect(layer, x, y + size, size, size);

    if checked {
        let inset = size * 0.2;
        let (near, far) = (inset, size - inset);
        draw_line(layer, x + near, y + near, x + far, y + far);
        draw_line(layer, x + near, y + far, x + far, y + near);
    }
}

// ============================================================================
// Images
// ============================================================================

/// Place `image` with its lower-left corner at `(x, y)`, `width_mm` wide.
pub fn embed_rgb(layer: &PdfLayerReference, image: &RgbImage, x: f32, y: f32, width_mm: f32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || width_mm <= 0.0 {
        return;
    }

    let xobject = ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: image.as_raw().clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    };
    add_image(layer, xobject, width, x, y, width_mm);
}

/// Grayscale variant, used for QR codes (no interpolation).
pub fn embed_gray(layer: &PdfLayerReference, image: &GrayImage, x: f32, y: f32, width_mm: f32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || width_mm <= 0.0 {
        return;
    }

    let xobject = ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Greyscale,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: image.as_raw().clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    };
    add_image(layer, xobject, width, x, y, width_mm);
}

fn add_image(
    layer: &PdfLayerReference,
    xobject: ImageXObject,
    width_px: u32,
    x: f32,
    y: f32,
    width_mm: f32,
) {
    // DPI = pixels / (mm / 25.4)
    let dpi = (width_px as f32) / (width_mm / 25.4);

    Image::from(xobject).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

/// Place an already JPEG-encoded RGB page image, `width_mm` wide.
pub fn embed_jpeg(
    layer: &PdfLayerReference,
    jpeg: Vec<u8>,
    (width, height): (u32, u32),
    x: f32,
    y: f32,
    width_mm: f32,
) {
    if width == 0 || height == 0 || width_mm <= 0.0 {
        return;
    }

    let xobject = ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
        smask: None,
    };
    add_image(layer, xobject, width, x, y, width_mm);
}
