//! What happens to a finished document: on-screen preview, file download,
//! and the storage side channel the mail sender reads from.
//!
//! A failed upload never fails the render. It only withdraws the "ready to
//! email" state of the delivery.

use crate::error::UploadError;
use crate::render::RenderedDocument;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const PDF_MIME: &str = "application/pdf";
const MISSING_RECORD_ID: &str = "sin-id";

// ============================================================================
// Preview / Download
// ============================================================================

/// In-memory document for on-screen preview. Clones share the bytes.
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    pub bytes: Arc<[u8]>,
    pub filename: String,
    pub mime: &'static str,
}

impl PreviewHandle {
    pub fn new(document: &RenderedDocument) -> Self {
        Self {
            bytes: Arc::from(document.bytes.as_slice()),
            filename: document.filename.clone(),
            mime: PDF_MIME,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Write the document under its generated filename inside `dir`.
pub fn save_download(document: &RenderedDocument, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&document.filename);
    std::fs::write(&path, &document.bytes)?;
    Ok(path)
}

// ============================================================================
// Storage
// ============================================================================

/// `{record id}/{UTC timestamp}-{filename}`
pub fn storage_key(record_id: &str, filename: &str, at: DateTime<Utc>) -> String {
    let id = record_id.trim();
    let id = if id.is_empty() { MISSING_RECORD_ID } else { id };
    format!("{}/{}-{}", id, at.format("%Y%m%dT%H%M%S%3fZ"), filename)
}

/// Storage collaborator. Returns where the bytes ended up.
pub trait DocumentStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, UploadError>;
}

/// Keys become relative paths under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentStore for DirectoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(path.display().to_string())
    }
}

/// `PUT {base_url}/{key}` with the PDF as body.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            base_url: base_url.into(),
            agent,
        }
    }
}

impl DocumentStore for HttpStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), key);
        let request = self.agent.put(&url).set("Content-Type", PDF_MIME);
        match request.send_bytes(bytes) {
            Ok(_) => Ok(url),
            Err(ureq::Error::Status(status, _)) => Err(UploadError::Rejected { status }),
            Err(e) => Err(UploadError::Http(e.to_string())),
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Stored { location: String },
    Failed { reason: String },
    /// No store configured.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub document: RenderedDocument,
    pub upload: UploadOutcome,
}

impl Delivery {
    /// The mail sender can attach the stored copy.
    pub fn email_ready(&self) -> bool {
        matches!(self.upload, UploadOutcome::Stored { .. })
    }

    pub fn preview(&self) -> PreviewHandle {
        PreviewHandle::new(&self.document)
    }
}

/// Hand the document to `store` (if any) and wait for the upload to finish
/// or fail. The document is returned either way.
pub async fn deliver(
    document: RenderedDocument,
    record_id: &str,
    store: Option<Arc<dyn DocumentStore>>,
) -> Delivery {
    let Some(store) = store else {
        return Delivery {
            document,
            upload: UploadOutcome::Skipped,
        };
    };

    let key = storage_key(record_id, &document.filename, Utc::now());
    let bytes: Arc<[u8]> = Arc::from(document.bytes.as_slice());

    let result = tokio::task::spawn_blocking(move || store.put(&key, &bytes))
        .await
        .map_err(|e| UploadError::Worker(e.to_string()))
        .and_then(|r| r);

    let upload = match result {
        Ok(location) => {
            log::info!("Stored {} at {}", document.filename, location);
            UploadOutcome::Stored { location }
        }
        Err(e) => {
            log::warn!("Upload of {} failed: {}", document.filename, e);
            UploadOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    Delivery { document, upload }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Backend;
    use chrono::TimeZone;

    fn document() -> RenderedDocument {
        RenderedDocument {
            backend: Backend::Vector,
            filename: "bitacora-Puerto-Varas-2024-03-10-def456.pdf".to_string(),
            bytes: b"%PDF-1.3 test".to_vec(),
            pages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    struct FailingStore;

    impl DocumentStore for FailingStore {
        fn put(&self, _key: &str, _bytes: &[u8]) -> Result<String, UploadError> {
            Err(UploadError::Rejected { status: 503 })
        }
    }

    #[test]
    fn test_storage_key_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 14, 5, 9).unwrap();
        assert_eq!(
            storage_key("abc123def456", "x.pdf", at),
            "abc123def456/20240310T140509000Z-x.pdf"
        );
        assert_eq!(
            storage_key(" ", "x.pdf", at),
            "sin-id/20240310T140509000Z-x.pdf"
        );
    }

    #[test]
    fn test_save_download_uses_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_download(&document(), dir.path()).unwrap();
        assert!(path.ends_with("bitacora-Puerto-Varas-2024-03-10-def456.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.3 test");
    }

    #[test]
    fn test_preview_shares_bytes() {
        let preview = PreviewHandle::new(&document());
        let clone = preview.clone();
        assert!(Arc::ptr_eq(&preview.bytes, &clone.bytes));
        assert_eq!(preview.mime, "application/pdf");
        assert_eq!(preview.len(), 13);
    }

    #[tokio::test]
    async fn test_directory_store_marks_email_ready() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(DirectoryStore::new(dir.path()));
        let delivery = deliver(document(), "abc123def456", Some(store)).await;

        assert!(delivery.email_ready());
        let UploadOutcome::Stored { location } = &delivery.upload else {
            panic!("expected stored upload, got {:?}", delivery.upload);
        };
        assert!(location.contains("abc123def456"));
        assert_eq!(std::fs::read(location).unwrap(), b"%PDF-1.3 test");
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_document() {
        let delivery = deliver(document(), "abc123def456", Some(Arc::new(FailingStore))).await;
        assert!(!delivery.email_ready());
        let UploadOutcome::Failed { reason } = &delivery.upload else {
            panic!("expected failed upload, got {:?}", delivery.upload);
        };
        assert!(reason.contains("503"));
        assert_eq!(delivery.document.bytes, b"%PDF-1.3 test");
    }

    #[tokio::test]
    async fn test_no_store_is_skipped() {
        let delivery = deliver(document(), "abc123def456", None).await;
        assert_eq!(delivery.upload, UploadOutcome::Skipped);
        assert!(!delivery.email_ready());
    }
}
