//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborators::{
    ChatReply, ChatRequest, Detection, Detector, LlmClient, OcrClient, OcrPage,
};
use crate::error::{CollaboratorError, ProcessError};
use crate::processor::raster::test_support::blank_png;
use crate::processor::{PageRenderer, RenderedPage};

/// OCR returning fixed text per filename; unknown files yield empty text.
pub struct FakeOcr {
    pages: HashMap<String, String>,
}

impl FakeOcr {
    pub fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl OcrClient for FakeOcr {
    async fn extract_text(&self, filename: &str, _image: &[u8]) -> Result<OcrPage, CollaboratorError> {
        Ok(OcrPage {
            filename: filename.to_string(),
            text: self.pages.get(filename).cloned().unwrap_or_default(),
            confidence: 0.9,
            num_lines: 1,
            error: None,
        })
    }
}

/// LLM answering by the first registered marker found in the prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<Vec<(String, String)>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(&self, marker: &str, answer: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((marker.to_string(), answer.to_string()));
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status {
                service: "LLM",
                status: 503,
                body: "model is loading".into(),
            });
        }
        let text = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| request.prompt.contains(marker.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_default();
        Ok(ChatReply {
            text,
            model: Some("scripted".into()),
        })
    }
}

/// Detector returning the same detections for every page.
pub struct FakeDetector {
    pub detections: Vec<Detection>,
    pub fail: bool,
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(
        &self,
        _filename: &str,
        _image: &[u8],
        min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Unauthorized {
                service: "Detector",
            });
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= min_confidence)
            .cloned()
            .collect())
    }
}

/// Renderer producing blank pages instead of shelling out to poppler.
pub struct FakeRenderer {
    pub pages: u32,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, pdf_bytes: &[u8], _dpi: u32) -> Result<Vec<RenderedPage>, ProcessError> {
        if !pdf_bytes.starts_with(b"%PDF") {
            return Err(ProcessError::PdfProcessing("Failed to load PDF: bad header".into()));
        }
        if self.pages == 0 {
            return Err(ProcessError::EmptyDocument);
        }
        Ok((1..=self.pages)
            .map(|page| RenderedPage {
                page,
                png: blank_png(self.width, self.height),
                width: self.width,
                height: self.height,
            })
            .collect())
    }
}

pub fn detection(category: &str, x: f64, y: f64, width: f64, height: f64, confidence: f64) -> Detection {
    Detection {
        category: category.to_string(),
        x,
        y,
        width,
        height,
        confidence,
    }
}
