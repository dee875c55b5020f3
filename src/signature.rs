//! Signature block composition.
//!
//! [`compose`] is the pure decision: signed block with verification code,
//! or placeholder. [`resolve`] then fetches and prepares the pixels each
//! backend embeds, so that backends never do I/O of their own.

use crate::error::RenderWarning;
use crate::identity;
use ::image::{DynamicImage, GrayImage, Luma, RgbImage, Rgba};
use qrcode::QrCode;
use std::io::Read;
use std::sync::Arc;

// ============================================================================
// Constants
// ============================================================================

/// Bounding box the captured signature is scaled into.
pub const SIGNATURE_BOX_WIDTH_MM: f32 = 58.0;
pub const SIGNATURE_BOX_HEIGHT_MM: f32 = 18.0;

/// Printed edge of the stamp QR code.
pub const STAMP_QR_MM: f32 = 12.0;

pub const PLACEHOLDER_LABEL: &str = "(Firma y Timbre)";
pub const STAMP_TITLE: &str = "FIRMADO ELECTRÓNICAMENTE";
pub const IMAGE_UNAVAILABLE_LABEL: &str = "(imagen de firma no disponible)";

// ============================================================================
// Composition
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SignatureBlock {
    Signed {
        reference: String,
        verification_code: String,
    },
    Placeholder {
        label: &'static str,
    },
}

impl SignatureBlock {
    pub fn is_signed(&self) -> bool {
        matches!(self, SignatureBlock::Signed { .. })
    }

    pub fn verification_code(&self) -> Option<&str> {
        match self {
            SignatureBlock::Signed { verification_code, .. } => Some(verification_code),
            SignatureBlock::Placeholder { .. } => None,
        }
    }

    /// Lines of the verification stamp, empty for placeholders.
    pub fn stamp_lines(&self) -> Vec<String> {
        match self.verification_code() {
            Some(code) => vec![STAMP_TITLE.to_string(), format!("Código: {}", code)],
            None => Vec::new(),
        }
    }
}

/// Signed only when the caller says so and a reference exists.
pub fn compose(
    has_signature: bool,
    signature_ref: Option<&str>,
    record_id: &str,
) -> SignatureBlock {
    match signature_ref.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reference) if has_signature => SignatureBlock::Signed {
            reference: reference.to_string(),
            verification_code: identity::verification_code(record_id),
        },
        _ => SignatureBlock::Placeholder {
            label: PLACEHOLDER_LABEL,
        },
    }
}

// ============================================================================
// Image Sources
// ============================================================================

/// Where signature image bytes come from.
pub trait SignatureSource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String>;
}

/// `http(s)://` references are downloaded, anything else is a file path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSignatureSource;

impl SignatureSource for DefaultSignatureSource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = ureq::get(reference)
                .call()
                .map_err(|e| format!("Failed to fetch URL: {}", e))?;

            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| format!("Failed to read response: {}", e))?;
            Ok(bytes)
        } else {
            std::fs::read(reference).map_err(|e| format!("{}: {}", reference, e))
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Everything a backend needs to draw the signature region.
#[derive(Debug, Clone)]
pub struct ResolvedSignature {
    pub block: SignatureBlock,
    /// Signature flattened onto white, ready to embed.
    pub image: Option<Arc<RgbImage>>,
    /// QR code for the stamp, one pixel per module.
    pub qr: Option<Arc<GrayImage>>,
    pub warnings: Vec<RenderWarning>,
}

pub fn resolve(
    block: SignatureBlock,
    record_id: &str,
    source: &dyn SignatureSource,
) -> ResolvedSignature {
    let SignatureBlock::Signed {
        reference,
        verification_code,
    } = &block
    else {
        return ResolvedSignature {
            block,
            image: None,
            qr: None,
            warnings: Vec::new(),
        };
    };

    let mut warnings = Vec::new();

    let image = match source.fetch(reference).and_then(|bytes| decode(&bytes)) {
        Ok(img) => Some(Arc::new(flatten_on_white(&img))),
        Err(reason) => {
            log::warn!(
                "Signature for record {} not embedded: {}",
                record_id, reason
            );
            warnings.push(RenderWarning::SignatureUnavailable { reason });
            None
        }
    };

    let qr = match stamp_qr(verification_code, record_id) {
        Ok(qr) => Some(Arc::new(qr)),
        Err(e) => {
            log::warn!("Stamp QR code skipped: {}", e);
            None
        }
    };

    ResolvedSignature {
        block,
        image,
        qr,
        warnings,
    }
}

// ============================================================================
// Image Helpers
// ============================================================================

fn decode(bytes: &[u8]) -> Result<DynamicImage, String> {
    ::image::load_from_memory(bytes).map_err(|e| format!("Failed to decode image: {}", e))
}

/// Composite against a white background so transparent strokes survive
/// RGB-only embedding.
pub fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba_image = image.to_rgba8();
    let (width_px, height_px) = rgba_image.dimensions();

    let mut rgb_image = RgbImage::new(width_px, height_px);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)) as u8;
        rgb_image.put_pixel(x, y, ::image::Rgb([out_r, out_g, out_b]));
    }
    rgb_image
}

/// Largest size with the image's aspect ratio inside `max_w` x `max_h`.
pub fn fit_within(
    width_px: u32,
    height_px: u32,
    max_width_mm: f32,
    max_height_mm: f32,
) -> (f32, f32) {
    if width_px == 0 || height_px == 0 {
        return (0.0, 0.0);
    }
    let aspect_ratio = width_px as f32 / height_px as f32;
    if max_width_mm / max_height_mm > aspect_ratio {
        // Height-constrained
        (max_height_mm * aspect_ratio, max_height_mm)
    } else {
        // Width-constrained
        (max_width_mm, max_width_mm / aspect_ratio)
    }
}

/// QR code holding `{code}|{record id}`, one pixel per module plus quiet zone.
pub fn stamp_qr(code: &str, record_id: &str) -> Result<GrayImage, String> {
    let payload = format!("{}|{}", code, record_id);
    let qr = QrCode::new(payload.as_bytes()).map_err(|e| e.to_string())?;
    Ok(qr.render::<Luma<u8>>().module_dimensions(1, 1).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{ImageFormat, RgbaImage};

    struct FixedSource(Result<Vec<u8>, String>);

    impl SignatureSource for FixedSource {
        fn fetch(&self, _reference: &str) -> Result<Vec<u8>, String> {
            self.0.clone()
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 10, Rgba([0, 0, 0, 255])));
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_compose_requires_flag_and_reference() {
        assert!(compose(true, Some("sig.png"), "abc123def456").is_signed());
        assert!(!compose(false, Some("sig.png"), "abc123def456").is_signed());
        assert!(!compose(true, None, "abc123def456").is_signed());
        assert!(!compose(true, Some("  "), "abc123def456").is_signed());
    }

    #[test]
    fn test_signed_block_code() {
        let block = compose(true, Some("https://example.test/sig.png"), "abc123def456");
        assert_eq!(block.verification_code(), Some("DL-ABC123DE"));
        assert_eq!(block.stamp_lines()[1], "Código: DL-ABC123DE");
    }

    #[test]
    fn test_placeholder_has_no_stamp() {
        let block = compose(false, None, "abc123def456");
        let expected = SignatureBlock::Placeholder {
            label: PLACEHOLDER_LABEL,
        };
        assert_eq!(block, expected);
        assert!(block.stamp_lines().is_empty());
    }

    #[test]
    fn test_resolve_embeds_image_and_qr() {
        let block = compose(true, Some("sig.png"), "abc123def456");
        let resolved = resolve(block, "abc123def456", &FixedSource(Ok(png_bytes())));
        assert!(resolved.warnings.is_empty());
        let image = resolved.image.as_ref().unwrap();
        assert_eq!(image.dimensions(), (40, 10));
        assert!(resolved.qr.is_some());
    }

    #[test]
    fn test_resolve_failed_fetch_stays_signed() {
        let block = compose(true, Some("sig.png"), "abc123def456");
        let resolved = resolve(block, "abc123def456", &FixedSource(Err("gone".into())));
        assert!(resolved.block.is_signed());
        assert!(resolved.image.is_none());
        let [RenderWarning::SignatureUnavailable { reason }] = resolved.warnings.as_slice() else {
            panic!("unexpected warnings: {:?}", resolved.warnings);
        };
        assert_eq!(reason, "gone");
    }

    #[test]
    fn test_resolve_placeholder_does_no_io() {
        let resolved = resolve(
            compose(false, Some("sig.png"), "abc"),
            "abc",
            &FixedSource(Err("must not be called".into())),
        );
        assert!(resolved.warnings.is_empty());
        assert!(resolved.image.is_none() && resolved.qr.is_none());
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let (w, h) = fit_within(400, 100, 58.0, 18.0);
        assert!((w / h - 4.0).abs() < 1e-3);
        assert!(w <= 58.0 && h <= 18.0);

        let (w, h) = fit_within(100, 100, 58.0, 18.0);
        assert_eq!((w, h), (18.0, 18.0));
    }

    #[test]
    fn test_flatten_transparent_is_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
