//! Declarative backend: build a styled document tree, then let the
//! compositor lay it out into pages.

use super::pdf;
use super::{base_warnings, Backend, RenderContext, RenderedDocument, Renderer};
use crate::error::RenderError;

pub mod compose;
pub mod tree;

pub use compose::Compositor;
pub use tree::{build_document, DocumentTree, Node};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeRenderer;

impl Renderer for DeclarativeRenderer {
    fn backend(&self) -> Backend {
        Backend::Declarative
    }

    async fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedDocument, RenderError> {
        let tree = build_document(ctx);
        let (doc, layers, fonts) =
            pdf::new_document("Bitácora de buceo", &tree.geometry, tree.pages.len())?;
        let mut warnings = base_warnings(ctx);
        let mut pages = Vec::with_capacity(tree.pages.len());

        for (page, layer) in tree.pages.iter().zip(layers.iter()) {
            let (summary, overflow) =
                Compositor::new(tree.geometry, layer, &fonts).paint_page(page);
            log::debug!("Declarative page {} composed", page.plan.index + 1);
            warnings.extend(overflow);
            pages.push(summary);
        }

        let bytes = pdf::save(doc)?;
        log::info!(
            "Declarative render of {} finished: {} page(s)",
            ctx.view.filename, pages.len()
        );

        Ok(RenderedDocument {
            backend: Backend::Declarative,
            filename: ctx.view.filename.clone(),
            bytes,
            pages,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LayoutGeometry, LayoutMode};
    use crate::model::normalize;
    use crate::record::DiveLogRecord;

    #[test]
    fn test_tree_follows_page_plans() {
        let vm = normalize(&DiveLogRecord::default());
        for mode in [LayoutMode::Compact, LayoutMode::Paginated] {
            let ctx = RenderContext::new(&vm, mode, false);
            let tree = build_document(&ctx);
            let expected: Vec<_> = LayoutGeometry::new(mode)
                .page_plans()
                .into_iter()
                .map(|p| p.regions)
                .collect();
            assert_eq!(compose::section_order(&tree), expected);
        }
    }
}
