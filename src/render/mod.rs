//! Rendering backends.
//!
//! Three interchangeable implementations produce the same form from the
//! same [`RenderContext`]:
//!
//! - [`VectorRenderer`]: positioned PDF primitives, cursor driven.
//! - [`RasterRenderer`]: component tree mounted in an off-screen host,
//!   rasterized and re-encoded page by page.
//! - [`DeclarativeRenderer`]: styled node tree handed to a tree-to-pages
//!   compositor; output text stays selectable.
//!
//! Layout rules (region order, crew table, signature, file naming) live in
//! the shared modules; only layout execution differs per backend.

use crate::crew::{CrewTable, CrewTablePolicy};
use crate::error::{RenderError, RenderWarning};
use crate::geometry::{LayoutGeometry, LayoutMode, Region};
use crate::model::ViewModel;
use crate::signature::{self, DefaultSignatureSource, ResolvedSignature, SignatureSource};
use std::fmt;

pub mod declarative;
pub(crate) mod pdf;
pub mod raster;
pub mod vector;

pub use declarative::DeclarativeRenderer;
pub use raster::{RasterOptions, RasterRenderer};
pub use vector::VectorRenderer;

// ============================================================================
// Backend Selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Vector,
    Raster,
    Declarative,
}

impl Backend {
    /// Layout used when the caller does not pick one.
    pub fn default_layout(self) -> LayoutMode {
        match self {
            Backend::Vector => LayoutMode::Compact,
            Backend::Raster | Backend::Declarative => LayoutMode::Paginated,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Vector => "vector",
            Backend::Raster => "raster",
            Backend::Declarative => "declarative",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Render Context
// ============================================================================

/// Per-call input. Built fresh for each render and dropped afterwards.
pub struct RenderContext<'a> {
    pub view: &'a ViewModel,
    pub geometry: LayoutGeometry,
    pub has_signature: bool,
    /// Keep raster capture hosts hidden from any visible surface.
    pub offscreen: bool,
    pub signature: ResolvedSignature,
}

impl<'a> RenderContext<'a> {
    pub fn new(view: &'a ViewModel, mode: LayoutMode, has_signature: bool) -> Self {
        Self::with_source(view, mode, has_signature, &DefaultSignatureSource)
    }

    pub fn with_source(
        view: &'a ViewModel,
        mode: LayoutMode,
        has_signature: bool,
        source: &dyn SignatureSource,
    ) -> Self {
        let signature_ref = view.signature_ref.as_deref();
        let block = signature::compose(has_signature, signature_ref, &view.record_id);
        let resolved = signature::resolve(block, &view.record_id, source);
        Self::with_signature(view, mode, has_signature, resolved)
    }

    /// Context around a signature that was already resolved.
    pub fn with_signature(
        view: &'a ViewModel,
        mode: LayoutMode,
        has_signature: bool,
        signature: ResolvedSignature,
    ) -> Self {
        Self {
            view,
            geometry: LayoutGeometry::new(mode),
            has_signature,
            offscreen: true,
            signature,
        }
    }

    /// Same as [`RenderContext::new`] for async callers: the signature image
    /// is fetched on the blocking pool.
    pub async fn prepare(
        view: &'a ViewModel,
        mode: LayoutMode,
        has_signature: bool,
    ) -> Result<Self, RenderError> {
        let signature_ref = view.signature_ref.as_deref();
        let block = signature::compose(has_signature, signature_ref, &view.record_id);
        let record_id = view.record_id.clone();
        let resolved = tokio::task::spawn_blocking(move || {
            signature::resolve(block, &record_id, &DefaultSignatureSource)
        })
        .await
        .map_err(|e| RenderError::EncodingFailed(format!("signature task failed: {}", e)))?;
        Ok(Self::with_signature(view, mode, has_signature, resolved))
    }

    pub fn crew_table(&self) -> CrewTable {
        CrewTablePolicy::layout_crew(&self.view.crew)
    }
}

// ============================================================================
// Output
// ============================================================================

/// Region order, emitted text and checkbox states of one output page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSummary {
    pub regions: Vec<Region>,
    pub texts: Vec<String>,
    /// Every checkbox drawn, by name, in drawing order.
    pub checks: Vec<(String, bool)>,
}

impl PageSummary {
    pub(crate) fn enter(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub(crate) fn text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.texts.push(text);
        }
    }

    pub(crate) fn check(&mut self, key: impl Into<String>, checked: bool) {
        self.checks.push((key.into(), checked));
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts.iter().any(|t| t.contains(needle))
    }

    /// State of the checkbox drawn under `key`, if this page has one.
    pub fn checked(&self, key: &str) -> Option<bool> {
        self.checks
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, checked)| *checked)
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub backend: Backend,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub pages: Vec<PageSummary>,
    pub warnings: Vec<RenderWarning>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Same page count, region order and text: the layout-equivalence bar.
    pub fn same_layout_as(&self, other: &RenderedDocument) -> bool {
        self.pages == other.pages
    }
}

// ============================================================================
// Renderer Trait
// ============================================================================

/// A backend that turns a render context into a finished document.
#[allow(async_fn_in_trait)]
pub trait Renderer {
    fn backend(&self) -> Backend;

    async fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError>;
}

/// Static dispatch over the three backends.
#[derive(Debug, Clone)]
pub enum AnyRenderer {
    Vector(VectorRenderer),
    Raster(RasterRenderer),
    Declarative(DeclarativeRenderer),
}

impl AnyRenderer {
    pub fn for_backend(backend: Backend, raster: RasterOptions) -> Self {
        match backend {
            Backend::Vector => AnyRenderer::Vector(VectorRenderer),
            Backend::Raster => AnyRenderer::Raster(RasterRenderer::new(raster)),
            Backend::Declarative => AnyRenderer::Declarative(DeclarativeRenderer),
        }
    }
}

impl Renderer for AnyRenderer {
    fn backend(&self) -> Backend {
        match self {
            AnyRenderer::Vector(r) => r.backend(),
            AnyRenderer::Raster(r) => r.backend(),
            AnyRenderer::Declarative(r) => r.backend(),
        }
    }

    async fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError> {
        match self {
            AnyRenderer::Vector(r) => r.render(ctx).await,
            AnyRenderer::Raster(r) => r.render(ctx).await,
            AnyRenderer::Declarative(r) => r.render(ctx).await,
        }
    }
}

/// Try `primary`, then each fallback once, with the same context.
/// Returns the last error when every backend fails.
pub async fn render_with_fallback(
    primary: &AnyRenderer,
    fallbacks: &[AnyRenderer],
    ctx: &RenderContext<'_>,
) -> Result<RenderedDocument, RenderError> {
    let mut last_error = match primary.render(ctx).await {
        Ok(document) => return Ok(document),
        Err(e) => e,
    };

    for renderer in fallbacks {
        log::warn!(
            "Render failed ({}); falling back to {} backend",
            last_error,
            renderer.backend()
        );
        match renderer.render(ctx).await {
            Ok(document) => return Ok(document),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Warnings every backend reports, before its own.
pub(crate) fn base_warnings(ctx: &RenderContext<'_>) -> Vec<RenderWarning> {
    ctx.signature.warnings.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        let names: Vec<String> = [Backend::Vector, Backend::Raster, Backend::Declarative]
            .iter()
            .map(Backend::to_string)
            .collect();
        assert_eq!(names, ["vector", "raster", "declarative"]);
    }

    #[tokio::test]
    async fn test_prepare_resolves_signature_off_runtime() {
        let record = crate::record::DiveLogRecord::from_json_str(
            r#"{"id":"abc123def456","signature_url":"/nonexistent/firmas/abc123def456.png"}"#,
        )
        .unwrap();
        let vm = crate::model::normalize(&record);

        let ctx = RenderContext::prepare(&vm, LayoutMode::Compact, true)
            .await
            .unwrap();
        assert_eq!(ctx.signature.block.verification_code(), Some("DL-ABC123DE"));
        assert!(ctx.signature.image.is_none());
        assert!(matches!(
            ctx.signature.warnings.as_slice(),
            [RenderWarning::SignatureUnavailable { .. }]
        ));

        let unsigned = RenderContext::prepare(&vm, LayoutMode::Compact, false)
            .await
            .unwrap();
        assert!(!unsigned.signature.block.is_signed());
        assert!(unsigned.signature.warnings.is_empty());
    }

    #[test]
    fn test_default_layouts() {
        assert_eq!(Backend::Vector.default_layout(), LayoutMode::Compact);
        assert_eq!(Backend::Declarative.default_layout(), LayoutMode::Paginated);
    }

    #[test]
    fn test_summary_ignores_empty_text() {
        let mut page = PageSummary::default();
        page.text("");
        page.text("Ana");
        assert_eq!(page.texts, vec!["Ana".to_string()]);
        assert!(page.contains_text("An"));
    }

    #[test]
    fn test_summary_looks_up_checks() {
        let mut page = PageSummary::default();
        page.check("Fila 1 Prof. <=20m: Sí", true);
        page.check("Fila 1 Prof. <=20m: No", false);
        assert_eq!(page.checked("Fila 1 Prof. <=20m: Sí"), Some(true));
        assert_eq!(page.checked("Fila 1 Prof. <=20m: No"), Some(false));
        assert_eq!(page.checked("Fila 2 Prof. <=20m: No"), None);
    }
}
