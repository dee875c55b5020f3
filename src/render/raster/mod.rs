//! Raster backend: mount a component tree in an off-screen host, wait for
//! it to come alive, capture it as a bitmap and re-encode page slices into
//! a PDF.
//!
//! The output is image-only; page summaries come from the host layout.

use super::pdf;
use super::{base_warnings, Backend, RenderContext, RenderedDocument, Renderer};
use crate::error::{RenderError, RenderWarning};
use ::image::codecs::jpeg::JpegEncoder;
use std::sync::Arc;
use std::time::Duration;

pub mod component;
pub mod host;
pub mod layout;
pub mod rasterize;

pub use host::{OffscreenHost, Stage};

use component::px;
use layout::HostLayout;
use rasterize::Glyphs;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Device pixels per CSS pixel.
    pub scale: f32,
    /// Characters of text the host must show before it is captured.
    pub min_text_len: usize,
    pub timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            min_text_len: 40,
            timeout: Duration::from_secs(10),
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RasterRenderer {
    options: RasterOptions,
    stage: Stage,
    /// Faces to paint with; system fonts when unset.
    glyphs: Option<Arc<Glyphs>>,
}

impl RasterRenderer {
    pub fn new(options: RasterOptions) -> Self {
        Self::with_stage(options, Stage::new())
    }

    /// Mount hosts on an existing stage instead of a private one.
    pub fn with_stage(options: RasterOptions, stage: Stage) -> Self {
        Self {
            options,
            stage,
            glyphs: None,
        }
    }

    /// Paint with `glyphs` instead of the system sans-serif faces.
    pub fn with_glyphs(mut self, glyphs: Arc<Glyphs>) -> Self {
        self.glyphs = Some(glyphs);
        self
    }

    pub fn options(&self) -> RasterOptions {
        self.options
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }
}

struct CapturedPage {
    jpeg: Vec<u8>,
    dimensions: (u32, u32),
    blank: bool,
}

struct Capture {
    pages: Vec<CapturedPage>,
    skipped_text: usize,
}

fn capture(
    host: &HostLayout,
    pages: usize,
    options: RasterOptions,
    glyphs: &Glyphs,
) -> Result<Capture, RenderError> {
    let painted = rasterize::paint(host, options.scale, glyphs);

    let pages = rasterize::slice_pages(&painted.image, pages)
        .into_iter()
        .map(|page| -> Result<CapturedPage, RenderError> {
            let blank = rasterize::corner_is_blank(&page);
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, options.jpeg_quality).encode_image(&page)?;
            Ok(CapturedPage {
                jpeg,
                dimensions: page.dimensions(),
                blank,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Capture {
        pages,
        skipped_text: painted.skipped_text,
    })
}

impl Renderer for RasterRenderer {
    fn backend(&self) -> Backend {
        Backend::Raster
    }

    async fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError> {
        let g = ctx.geometry;
        let pages = component::build_pages(ctx);
        let page_count = pages.len();

        let mut host = OffscreenHost::acquire(
            &self.stage,
            px(g.page.width_mm),
            px(g.page.height_mm) * page_count as f32,
            ctx.offscreen,
        );
        host.mount(pages);
        let layout = host
            .wait_until_live(self.options.min_text_len, self.options.timeout)
            .await?;

        let options = self.options;
        let glyphs = self.glyphs.clone();
        let captured_layout = layout.clone();
        let captured = tokio::task::spawn_blocking(move || {
            let glyphs = glyphs.as_deref().unwrap_or_else(|| rasterize::glyphs());
            capture(&captured_layout, page_count, options, glyphs)
        })
        .await
        .map_err(|e| RenderError::EncodingFailed(format!("capture task failed: {}", e)))??;
        drop(host);

        let mut warnings = base_warnings(ctx);
        for (page, region) in &layout.overflow {
            warnings.push(RenderWarning::RegionOverflow {
                page: *page,
                region: *region,
            });
        }
        let skipped = captured.skipped_text;
        if skipped > 0 {
            log::warn!("Raster capture painted no text: {} run(s) skipped", skipped);
            warnings.push(RenderWarning::GlyphsUnavailable { skipped });
        }

        let (doc, layers, _fonts) =
            pdf::new_document("Bitácora de buceo", &g, captured.pages.len())?;
        for (index, (page, layer)) in captured.pages.into_iter().zip(layers.iter()).enumerate() {
            if page.blank {
                log::warn!("Raster capture of page {} looks blank", index + 1);
                warnings.push(RenderWarning::CaptureBlank { page: index });
            }
            pdf::embed_jpeg(layer, page.jpeg, page.dimensions, 0.0, 0.0, g.page.width_mm);
            log::debug!("Raster page {} encoded", index + 1);
        }

        let bytes = pdf::save(doc)?;
        log::info!(
            "Raster render of {} finished: {} page(s)",
            ctx.view.filename, layout.pages.len()
        );

        Ok(RenderedDocument {
            backend: Backend::Raster,
            filename: ctx.view.filename.clone(),
            bytes,
            pages: layout.pages.clone(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LayoutMode, Region};
    use crate::model::normalize;
    use crate::record::DiveLogRecord;

    fn record() -> DiveLogRecord {
        DiveLogRecord::from_json_str(
            r#"{"id":"abc123def456","log_date":"2024-03-10","centers":{"name":"Puerto Varas"},
                "divers_manifest":[{"name":"Ana","role":"diver"}]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_page_counts_follow_layout() {
        let vm = normalize(&record());
        let renderer = RasterRenderer::default();
        for (mode, pages) in [(LayoutMode::Compact, 1), (LayoutMode::Paginated, 2)] {
            let ctx = RenderContext::new(&vm, mode, false);
            let doc = renderer.render(&ctx).await.unwrap();
            assert_eq!(doc.page_count(), pages);
            assert!(doc.bytes.starts_with(b"%PDF"));
            assert!(doc.pages.iter().all(|p| p.contains_text("DEF456")));
            let blank = |w: &RenderWarning| matches!(w, RenderWarning::CaptureBlank { .. });
            assert!(!doc.warnings.iter().any(blank));
        }
        assert_eq!(renderer.stage().mounted(), 0);
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_host_mounted() {
        let vm = normalize(&record());
        let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
        let renderer = RasterRenderer::new(RasterOptions {
            min_text_len: usize::MAX,
            timeout: Duration::from_millis(200),
            ..RasterOptions::default()
        });

        let err = renderer.render(&ctx).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderTimeout { .. }));
        assert_eq!(renderer.stage().mounted(), 0);
    }

    #[tokio::test]
    async fn test_missing_faces_reported() {
        let vm = normalize(&record());
        let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
        let renderer = RasterRenderer::default().with_glyphs(Arc::new(Glyphs::none()));

        let doc = renderer.render(&ctx).await.unwrap();
        assert_eq!(doc.page_count(), 2);
        let skipped = doc.warnings.iter().find_map(|w| match w {
            RenderWarning::GlyphsUnavailable { skipped } => Some(*skipped),
            _ => None,
        });
        assert!(skipped.is_some_and(|n| n > 0), "{:?}", doc.warnings);
        assert_eq!(renderer.stage().mounted(), 0);
    }

    #[tokio::test]
    async fn test_region_order_matches_plan() {
        let vm = normalize(&record());
        let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
        let doc = RasterRenderer::default().render(&ctx).await.unwrap();
        assert_eq!(doc.pages[0].regions.first(), Some(&Region::Header));
        assert_eq!(doc.pages[1].regions.last(), Some(&Region::Footer));
    }
}
