//! divelog-pdf: printable dive-log ("bitácora de buceo") documents.
//!
//! A raw joined record is normalized into a [`ViewModel`], laid out with
//! shared geometry, crew table and signature rules, and handed to one of
//! three interchangeable rendering backends. The result can be previewed,
//! saved for download, or pushed to a storage side channel.

pub mod crew;
pub mod delivery;
pub mod error;
pub mod form;
pub mod geometry;
pub mod identity;
pub mod model;
pub mod record;
pub mod render;
pub mod signature;

pub use delivery::{deliver, save_download, Delivery, DocumentStore, PreviewHandle, UploadOutcome};
pub use error::{RecordError, RenderError, RenderWarning, UploadError};
pub use geometry::{LayoutMode, Region};
pub use model::{normalize, ViewModel};
pub use record::DiveLogRecord;
pub use render::{
    render_with_fallback, AnyRenderer, Backend, RasterOptions, RenderContext, RenderedDocument,
    Renderer,
};
