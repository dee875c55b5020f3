// divelog-pdf: Generate dive-log (bitácora de buceo) PDFs from joined records

use clap::{Parser, ValueEnum};
use divelog_pdf::delivery::{
    self, DirectoryStore, DocumentStore, HttpStore, PreviewHandle, UploadOutcome,
};
use divelog_pdf::{
    normalize, render_with_fallback, AnyRenderer, Backend, DiveLogRecord, LayoutMode, RasterOptions,
    RecordError, RenderContext, RenderError, RenderedDocument,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load record: {0}")]
    RecordError(#[from] RecordError),
    #[error("Failed to create PDF: {0}")]
    RenderError(#[from] RenderError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendArg {
    Vector,
    Raster,
    Declarative,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Vector => Backend::Vector,
            BackendArg::Raster => Backend::Raster,
            BackendArg::Declarative => Backend::Declarative,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutArg {
    Compact,
    Paginated,
}

impl From<LayoutArg> for LayoutMode {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Compact => LayoutMode::Compact,
            LayoutArg::Paginated => LayoutMode::Paginated,
        }
    }
}

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate dive-log (bitácora de buceo) PDFs")]
struct Args {
    /// Dive-log record as JSON (`-` reads stdin)
    #[arg(short, long)]
    record: String,

    /// Rendering backend
    #[arg(short, long, value_enum, default_value = "vector")]
    backend: BackendArg,

    /// Page layout (defaults to compact for vector, paginated otherwise)
    #[arg(short, long, value_enum)]
    layout: Option<LayoutArg>,

    /// Render the supervisor signature block as signed
    #[arg(long)]
    signature: bool,

    /// Backend tried once if the first one fails
    #[arg(long, value_enum)]
    fallback: Option<BackendArg>,

    /// Output filename (defaults to the generated name inside --output-dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the generated file
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Also store a copy under this directory, keyed by record and time
    #[arg(long, env = "DIVELOG_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Also PUT a copy under this base URL, keyed by record and time
    #[arg(long, env = "DIVELOG_STORE_URL", conflicts_with = "store_dir")]
    store_url: Option<String>,

    /// How long the raster backend waits for its off-screen host
    #[arg(long, default_value = "10000")]
    render_timeout_ms: u64,

    /// Render in memory only and print a summary; nothing is written
    #[arg(long)]
    preview: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        if let AppError::RenderError(render) = &e {
            eprintln!("{}", render.user_message());
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let args = Args::parse();

    // Load and normalize the record
    let record = load_record(&args.record)?;
    let view = normalize(&record);

    let backend = Backend::from(args.backend);
    let mode = args
        .layout
        .map(LayoutMode::from)
        .unwrap_or_else(|| backend.default_layout());
    let raster = RasterOptions {
        timeout: Duration::from_millis(args.render_timeout_ms),
        ..RasterOptions::default()
    };

    let primary = AnyRenderer::for_backend(backend, raster);
    let fallbacks: Vec<AnyRenderer> = args
        .fallback
        .map(Backend::from)
        .filter(|b| *b != backend)
        .map(|b| AnyRenderer::for_backend(b, raster))
        .into_iter()
        .collect();

    let ctx = RenderContext::prepare(&view, mode, args.signature).await?;
    let document = render_with_fallback(&primary, &fallbacks, &ctx).await?;
    let verification = ctx.signature.block.verification_code();

    if args.preview {
        let preview = PreviewHandle::new(&document);
        println!(
            "✓ Preview: {} ({} bytes, {})",
            preview.filename, preview.len(), preview.mime
        );
        print_summary(&document, verification);
        return Ok(());
    }

    // Write the download copy
    let output_file = match args.output {
        Some(path) => {
            std::fs::write(&path, &document.bytes)?;
            path
        }
        None => delivery::save_download(&document, &args.output_dir)?,
    };

    // Storage side channel
    let store: Option<Arc<dyn DocumentStore>> = match (args.store_dir, args.store_url) {
        (Some(dir), _) => Some(Arc::new(DirectoryStore::new(dir))),
        (None, Some(url)) => Some(Arc::new(HttpStore::new(url))),
        (None, None) => None,
    };
    let delivered = delivery::deliver(document, &view.record_id, store).await;

    println!("✓ Generated: {}", output_file.display());
    print_summary(&delivered.document, verification);
    match &delivered.upload {
        UploadOutcome::Stored { location } => println!("  Stored: {}", location),
        UploadOutcome::Failed { reason } => {
            println!(
                "  Warning: document generated but not available for email ({})",
                reason
            )
        }
        UploadOutcome::Skipped => {}
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_record(source: &str) -> Result<DiveLogRecord, AppError> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source).map_err(RecordError::from)?
    };
    Ok(DiveLogRecord::from_json_str(&content)?)
}

fn print_summary(document: &RenderedDocument, verification_code: Option<&str>) {
    println!("  Backend: {}", document.backend);
    println!("  Pages: {}", document.page_count());
    if let Some(code) = verification_code {
        println!("  Verification: {}", code);
    }
    for warning in &document.warnings {
        println!("  Warning: {}", warning);
    }
}
