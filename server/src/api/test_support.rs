//! Router fixtures: in-memory services with stub collaborators.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};

use docverify::collaborators::{Collaborators, Detection, Detector};
use docverify::config::Settings;
use docverify::error::{CollaboratorError, ProcessError};
use docverify::processor::{PageRenderer, RenderedPage, UploadedFile};
use docverify::{AppContext, Database, DocumentStorage};

use super::router::build_router;
use super::state::AppState;

pub const BOUNDARY: &str = "docverify-test-boundary";

struct WhitePages;

#[async_trait]
impl PageRenderer for WhitePages {
    async fn render(&self, pdf_bytes: &[u8], _dpi: u32) -> Result<Vec<RenderedPage>, ProcessError> {
        if !pdf_bytes.starts_with(b"%PDF") {
            return Err(ProcessError::PdfProcessing("Failed to load PDF".into()));
        }
        let img = RgbImage::from_pixel(120, 160, Rgb([255, 255, 255]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png)
            .map_err(|e| ProcessError::ImageProcessing(e.to_string()))?;
        Ok(vec![RenderedPage {
            page: 1,
            png: png.into_inner(),
            width: 120,
            height: 160,
        }])
    }
}

struct StampOnly;

#[async_trait]
impl Detector for StampOnly {
    async fn detect(
        &self,
        _filename: &str,
        _image: &[u8],
        _min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        Ok(vec![Detection {
            category: "stamp".into(),
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 30.0,
            confidence: 0.8,
        }])
    }
}

pub struct TestApp {
    pub state: AppState,
    pub settings: Settings,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_auto_analyze(true)
    }

    pub fn without_auto_analyze() -> Self {
        Self::with_auto_analyze(false)
    }

    fn with_auto_analyze(auto_analyze: bool) -> Self {
        let vars = HashMap::from([
            ("SERVER_PORT", "0".to_string()),
            ("DATABASE_PATH", ":memory:".to_string()),
            ("USE_STUB_ADAPTER", "true".to_string()),
            ("STORAGE_ROOT", "/unused".to_string()),
            ("AUTO_ANALYZE", auto_analyze.to_string()),
        ]);
        let settings = Settings::from_lookup(|name| vars.get(name).cloned()).unwrap();

        let collaborators = Collaborators {
            detector: Arc::new(StampOnly),
            ..Collaborators::stub()
        };
        let ctx = AppContext::assemble(
            Database::open_in_memory().unwrap(),
            DocumentStorage::in_memory("http://objects.test"),
            collaborators,
            Arc::new(WhitePages),
            &settings,
        );
        let state = AppState {
            ctx,
            app_name: settings.app_name.clone(),
        };
        Self { state, settings }
    }

    pub fn router(&self) -> Router {
        build_router(
            self.state.clone(),
            &self.settings.api_prefix,
            &self.settings.server,
        )
    }

    /// Uploads one PDF and waits until it is labeled (and analyzed when enabled).
    pub async fn labeled_document(&self, name: &str) -> (i64, i64) {
        let created = self
            .state
            .ctx
            .sessions
            .create(vec![UploadedFile {
                filename: name.to_string(),
                bytes: b"%PDF-1.4 fixture".to_vec(),
            }])
            .await
            .unwrap();
        let ids = (created.session.id, created.documents[0].id);
        for task in created.tasks {
            task.await.unwrap();
        }
        ids
    }
}

/// Encodes `(field, filename, bytes)` parts as a multipart body.
pub fn multipart_body(files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
