use crate::geometry::Region;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Render Errors
// ============================================================================

/// Fatal failures of a single render call.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render did not complete: off-screen content not ready after {waited_ms} ms")]
    RenderTimeout { waited_ms: u64 },
    #[error("Failed to encode document: {0}")]
    EncodingFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the same backend may reasonably be asked again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::RenderTimeout { .. })
    }

    /// Generic message shown to the person who requested the document.
    pub fn user_message(&self) -> &'static str {
        "No se pudo generar el documento. Intente nuevamente."
    }
}

impl From<::image::ImageError> for RenderError {
    fn from(err: ::image::ImageError) -> Self {
        RenderError::EncodingFailed(err.to_string())
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal conditions reported alongside a finished document.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderWarning {
    /// The sampled corner of a captured page held only background pixels.
    CaptureBlank { page: usize },
    /// No font face was available; laid-out text was left off the capture.
    GlyphsUnavailable { skipped: usize },
    /// The record is signed but its signature image could not be embedded.
    SignatureUnavailable { reason: String },
    /// A growable region ran past the bottom margin of its page.
    RegionOverflow { page: usize, region: Region },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::CaptureBlank { page } => {
                write!(f, "page {} capture looks blank", page + 1)
            }
            RenderWarning::GlyphsUnavailable { skipped } => {
                write!(f, "no font available; {} text run(s) not painted", skipped)
            }
            RenderWarning::SignatureUnavailable { reason } => {
                write!(f, "signature image unavailable: {}", reason)
            }
            RenderWarning::RegionOverflow { page, region } => {
                write!(f, "region {:?} overflows page {}", region, page + 1)
            }
        }
    }
}

// ============================================================================
// Upload / Input Errors
// ============================================================================

/// Storage side-channel failures. These never fail a render.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP upload failed: {0}")]
    Http(String),
    #[error("Storage rejected upload with status {status}")]
    Rejected { status: u16 },
    #[error("Upload worker failed: {0}")]
    Worker(String),
}

/// The input file could not be read as a record at all.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to read record: {0}")]
    Read(#[from] std::io::Error),
    #[error("Invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record must be a JSON object")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(RenderError::RenderTimeout { waited_ms: 10 }.is_retryable());
        assert!(!RenderError::EncodingFailed("boom".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::RenderTimeout { waited_ms: 250 };
        assert_eq!(
            err.to_string(),
            "Render did not complete: off-screen content not ready after 250 ms"
        );

        let warning = RenderWarning::CaptureBlank { page: 1 };
        assert_eq!(warning.to_string(), "page 2 capture looks blank");

        let warning = RenderWarning::GlyphsUnavailable { skipped: 12 };
        assert_eq!(
            warning.to_string(),
            "no font available; 12 text run(s) not painted"
        );

        let err = UploadError::Rejected { status: 403 };
        assert_eq!(err.to_string(), "Storage rejected upload with status 403");
    }
}
