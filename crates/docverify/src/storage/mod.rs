//! Object storage for original PDFs, rendered pages and labeled pages.
//!
//! Keys follow a fixed layout per document:
//!
//! ```text
//! sessions/{session_id}/documents/{document_id}/original.pdf
//! sessions/{session_id}/documents/{document_id}/pages/page_{n}.png
//! sessions/{session_id}/documents/{document_id}/labeled/page_{n}.png
//! ```

use std::sync::Arc;

use futures_util::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use crate::error::StorageError;

mod backend;

pub use backend::build_store;

/// Prefix shared by every object of one document.
pub fn document_key(session_id: i64, document_id: i64) -> String {
    format!("sessions/{session_id}/documents/{document_id}")
}

pub fn original_key(document_key: &str) -> String {
    format!("{document_key}/original.pdf")
}

pub fn page_key(document_key: &str, page: u32) -> String {
    format!("{document_key}/pages/page_{page}.png")
}

pub fn labeled_page_key(document_key: &str, page: u32) -> String {
    format!("{document_key}/labeled/page_{page}.png")
}

/// A rendered page image fetched back from storage.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub filename: String,
    pub page: Option<u32>,
    pub bytes: Vec<u8>,
}

/// Parses `page_12.png` into `12`.
pub fn page_number(filename: &str) -> Option<u32> {
    filename
        .strip_prefix("page_")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

#[derive(Clone)]
pub struct DocumentStorage {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    /// Whether the backend accepts object attributes (content type).
    attributes: bool,
}

impl DocumentStorage {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            attributes: false,
        }
    }

    /// Sends a `Content-Type` with every upload.
    pub fn with_content_types(mut self) -> Self {
        self.attributes = true;
        self
    }

    /// Process-local storage, used in tests and demos.
    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), public_base_url)
    }

    /// Browser-reachable URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    /// Uploads an object and returns its public URL.
    pub async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = ObjectPath::from(key);
        let size = bytes.len();
        let mut options = PutOptions::default();
        if self.attributes {
            let content_type = mime_guess::from_path(key).first_or_octet_stream();
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            options.attributes = attributes;
        }
        self.store
            .put_opts(&path, PutPayload::from(bytes), options)
            .await?;
        tracing::debug!(key, size, "stored object");
        Ok(self.public_url(key))
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = ObjectPath::from(key);
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Downloads every `.png` under `{document_key}/pages/`, ordered by page.
    pub async fn list_page_images(&self, document_key: &str) -> Result<Vec<PageImage>, StorageError> {
        let prefix = ObjectPath::from(format!("{document_key}/pages"));
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;
        if objects.is_empty() {
            return Err(StorageError::NotFound(format!(
                "No images found for prefix: {prefix}/"
            )));
        }

        let mut images = Vec::new();
        for meta in objects {
            let Some(filename) = meta.location.filename().map(str::to_string) else {
                continue;
            };
            if !filename.to_ascii_lowercase().ends_with(".png") {
                continue;
            }
            let bytes = self.store.get(&meta.location).await?.bytes().await?;
            images.push(PageImage {
                page: page_number(&filename),
                filename,
                bytes: bytes.to_vec(),
            });
        }

        if images.is_empty() {
            return Err(StorageError::NotFound(format!(
                "No PNG images found for prefix: {prefix}/"
            )));
        }

        images.sort_by(|a, b| {
            a.page
                .unwrap_or(u32::MAX)
                .cmp(&b.page.unwrap_or(u32::MAX))
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(images)
    }
}

impl std::fmt::Debug for DocumentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStorage")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}
