use divelog_pdf::render::{DeclarativeRenderer, PageSummary, RasterRenderer, VectorRenderer};
use divelog_pdf::signature::SignatureSource;
use divelog_pdf::{
    normalize, render_with_fallback, AnyRenderer, Backend, DiveLogRecord, LayoutMode, RasterOptions,
    Region, RenderContext, RenderError, RenderWarning, RenderedDocument, Renderer, ViewModel,
};
use std::time::Duration;

const MINIMAL: &str = include_str!("fixtures/minimal.json");
const FULL: &str = include_str!("fixtures/full.json");

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn view(json: &str) -> ViewModel {
    normalize(&DiveLogRecord::from_json_str(json).unwrap())
}

fn signed_view() -> ViewModel {
    view(r#"{"id":"abc123def456","log_date":"2024-03-10","centers":{"name":"Puerto Varas"},
             "signature_url":"firmas/abc123def456.png","divers_manifest":[{"name":"Ana"}]}"#)
}

fn renderers() -> Vec<AnyRenderer> {
    vec![
        AnyRenderer::Vector(VectorRenderer),
        AnyRenderer::Raster(RasterRenderer::default()),
        AnyRenderer::Declarative(DeclarativeRenderer),
    ]
}

async fn render_all(ctx: &RenderContext<'_>) -> Vec<RenderedDocument> {
    let mut documents = Vec::new();
    for renderer in renderers() {
        let document = renderer.render(ctx).await.unwrap();
        assert_eq!(document.backend, renderer.backend());
        documents.push(document);
    }
    documents
}

fn region_order(document: &RenderedDocument) -> Vec<Vec<Region>> {
    document.pages.iter().map(|p| p.regions.clone()).collect()
}

/// Serves a small opaque signature image for any reference.
struct InkSource;

impl SignatureSource for InkSource {
    fn fetch(&self, _reference: &str) -> Result<Vec<u8>, String> {
        let pixel = image::Rgba([10, 10, 80, 255]);
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(60, 20, pixel));
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| e.to_string())?;
        Ok(bytes)
    }
}

struct OfflineSource;

impl SignatureSource for OfflineSource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        Err(format!("{}: connection refused", reference))
    }
}

#[tokio::test]
async fn test_region_order_identical_across_backends() {
    init_logging();
    let vm = view(FULL);
    for mode in [LayoutMode::Compact, LayoutMode::Paginated] {
        let ctx = RenderContext::new(&vm, mode, false);
        let documents = render_all(&ctx).await;
        let expected = region_order(&documents[0]);

        assert_eq!(expected.len(), mode.page_count());
        for document in &documents {
            assert_eq!(
                region_order(document),
                expected,
                "{} diverges in {:?}",
                document.backend,
                mode
            );
        }
    }
}

#[tokio::test]
async fn test_paginated_split() {
    let vm = view(FULL);
    let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
    for document in render_all(&ctx).await {
        assert_eq!(document.page_count(), 2);
        let first = &document.pages[0].regions;
        let second = &document.pages[1].regions;
        assert!(first.contains(&Region::GeneralData));
        assert!(!first.contains(&Region::Signatures));
        assert!(second.contains(&Region::Signatures));
        assert!(second.contains(&Region::CrewTable));
        assert!(
            document.pages[1].contains_text("(continuación)"),
            "{}",
            document.backend
        );

        // Depth boxes travel with their rows.
        assert!(document.pages[0].checked("Fila 2 Prof. <=20m: Sí").is_some());
        assert!(document.pages[0].checked("Fila 3 Prof. <=20m: Sí").is_none());
        assert!(document.pages[1].checked("Fila 3 Prof. <=20m: Sí").is_some());
    }
}

#[tokio::test]
async fn test_short_id_and_page_label_on_every_page() {
    let vm = view(MINIMAL);
    for mode in [LayoutMode::Compact, LayoutMode::Paginated] {
        let ctx = RenderContext::new(&vm, mode, false);
        for document in render_all(&ctx).await {
            let total = document.page_count();
            for (i, page) in document.pages.iter().enumerate() {
                assert!(
                    page.contains_text("DEF456"),
                    "{} page {}",
                    document.backend,
                    i + 1
                );
                assert!(page.contains_text(&format!("Página {} de {}", i + 1, total)));
            }
        }
    }
}

#[tokio::test]
async fn test_filename_follows_record_identity() {
    let vm = view(MINIMAL);
    assert_eq!(vm.filename, "bitacora-Puerto-Varas-2024-03-10-def456.pdf");
    assert_eq!(vm.verification_code, "DL-ABC123DE");

    let ctx = RenderContext::new(&vm, LayoutMode::Compact, false);
    for document in render_all(&ctx).await {
        assert_eq!(document.filename, vm.filename);
        assert!(document.bytes.starts_with(b"%PDF"));
    }
}

#[tokio::test]
async fn test_rendering_is_idempotent() {
    let vm = view(FULL);
    let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
    for renderer in renderers() {
        let first = renderer.render(&ctx).await.unwrap();
        let second = renderer.render(&ctx).await.unwrap();
        assert!(
            first.same_layout_as(&second),
            "{} is not idempotent",
            renderer.backend()
        );
    }
}

#[tokio::test]
async fn test_crew_table_padded_to_four_rows() {
    let vm = view(MINIMAL);
    let ctx = RenderContext::new(&vm, LayoutMode::Compact, false);
    let table = ctx.crew_table();
    assert_eq!(table.rows().len(), 4);
    assert!(table.rows()[0].cells.is_some());
    assert!(table.rows()[1..].iter().all(|r| r.cells.is_none()));

    for document in render_all(&ctx).await {
        let page = &document.pages[0];
        assert!(page.contains_text("Ana"), "{}", document.backend);
        for number in 1..=4 {
            let label = number.to_string();
            assert!(
                page.texts.contains(&label),
                "{} row {}",
                document.backend,
                number
            );
        }
    }
}

fn box_pair(page: &PageSummary, group: &str, options: [&str; 2]) -> [Option<bool>; 2] {
    options.map(|option| page.checked(&format!("{}: {}", group, option)))
}

fn weather_pair(page: &PageSummary) -> [Option<bool>; 2] {
    let group = "Condición meteorológica";
    box_pair(page, group, ["Favorable", "Desfavorable"])
}

fn depth(page: &PageSummary, row: usize) -> [Option<bool>; 2] {
    box_pair(page, &format!("Fila {} Prof. <=20m", row), ["Sí", "No"])
}

#[tokio::test]
async fn test_tristates_mark_checkbox_pairs() {
    let cases = [
        (Some(true), [Some(true), Some(false)]),
        (Some(false), [Some(false), Some(true)]),
        (None, [Some(false), Some(false)]),
    ];
    for (weather, weather_boxes) in cases {
        let record = serde_json::json!({
            "id": "abc123def456",
            "weather_good": weather,
            "divers_manifest": [
                { "name": "Ana", "standard_depth": true },
                { "name": "Pedro", "standard_depth": false },
                { "name": "Marta" },
            ],
        });
        let vm = view(&record.to_string());
        let ctx = RenderContext::new(&vm, LayoutMode::Compact, false);

        for document in render_all(&ctx).await {
            let page = &document.pages[0];
            let backend = document.backend;

            assert_eq!(
                weather_pair(page),
                weather_boxes,
                "{} weather {:?}",
                backend,
                weather
            );
            assert_eq!(depth(page, 1), [Some(true), Some(false)], "{}", backend);
            assert_eq!(depth(page, 2), [Some(false), Some(true)], "{}", backend);
            assert_eq!(depth(page, 3), [Some(false), Some(false)], "{}", backend);
            assert_eq!(depth(page, 4), [Some(false), Some(false)], "{}", backend);

            let marked = page.checks.iter().filter(|(_, checked)| *checked).count();
            assert_eq!(marked, 2 + usize::from(weather.is_some()), "{}", backend);
        }
    }
}

#[tokio::test]
async fn test_signed_record_shows_verification_code() {
    let vm = signed_view();
    let ctx = RenderContext::with_source(&vm, LayoutMode::Paginated, true, &InkSource);
    assert!(ctx.signature.image.is_some());

    for document in render_all(&ctx).await {
        let last = document.pages.last().unwrap();
        assert!(last.contains_text("DL-ABC123DE"), "{}", document.backend);
        assert!(!document
            .warnings
            .iter()
            .any(|w| matches!(w, RenderWarning::SignatureUnavailable { .. })));
    }
}

#[tokio::test]
async fn test_unavailable_signature_still_signed() {
    let vm = signed_view();
    let ctx = RenderContext::with_source(&vm, LayoutMode::Compact, true, &OfflineSource);

    for document in render_all(&ctx).await {
        assert!(
            document.pages[0].contains_text("DL-ABC123DE"),
            "{}",
            document.backend
        );
        assert!(document
            .warnings
            .iter()
            .any(|w| matches!(w, RenderWarning::SignatureUnavailable { .. })));
    }
}

#[tokio::test]
async fn test_signature_flag_off_shows_placeholder() {
    let vm = signed_view();
    let ctx = RenderContext::with_source(&vm, LayoutMode::Compact, false, &InkSource);
    assert!(!ctx.signature.block.is_signed());

    for document in render_all(&ctx).await {
        let (page, backend) = (&document.pages[0], document.backend);
        assert!(page.contains_text("(Firma y Timbre)"), "{}", backend);
        assert!(!page.contains_text("DL-ABC123DE"), "{}", backend);
    }
}

#[tokio::test]
async fn test_raster_timeout_falls_back() {
    init_logging();
    let vm = view(MINIMAL);
    let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
    let raster = RasterRenderer::new(RasterOptions {
        min_text_len: usize::MAX,
        timeout: Duration::from_millis(100),
        ..RasterOptions::default()
    });
    let stage = raster.stage().clone();
    let primary = AnyRenderer::Raster(raster);

    let fallbacks = [AnyRenderer::Declarative(DeclarativeRenderer)];
    let document = render_with_fallback(&primary, &fallbacks, &ctx)
        .await
        .unwrap();
    assert_eq!(document.backend, Backend::Declarative);
    assert_eq!(stage.mounted(), 0);

    let err = render_with_fallback(&primary, &[], &ctx).await.unwrap_err();
    assert!(matches!(err, RenderError::RenderTimeout { .. }));
    assert_eq!(
        err.user_message(),
        "No se pudo generar el documento. Intente nuevamente."
    );
    assert_eq!(stage.mounted(), 0);
}

#[tokio::test]
async fn test_degraded_record_still_renders() {
    let vm = view(r#"{"divers_manifest":"not json","weather_good":"yes"}"#);
    assert_eq!(vm.filename, "bitacora-sin-centro-sin-fecha-.pdf");

    let ctx = RenderContext::new(&vm, LayoutMode::Paginated, false);
    for document in render_all(&ctx).await {
        assert_eq!(document.page_count(), 2);
        let page = &document.pages[0];
        assert!(page.contains_text("N/A"), "{}", document.backend);
    }
}
