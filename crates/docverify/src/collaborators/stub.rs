//! Deterministic in-process collaborators for local development.

use async_trait::async_trait;

use super::{ChatReply, ChatRequest, Detection, Detector, LlmClient, OcrClient, OcrPage};
use crate::error::CollaboratorError;

#[derive(Debug, Clone, Copy, Default)]
pub struct StubOcrClient;

#[async_trait]
impl OcrClient for StubOcrClient {
    async fn extract_text(&self, filename: &str, image: &[u8]) -> Result<OcrPage, CollaboratorError> {
        Ok(OcrPage {
            filename: filename.to_string(),
            text: format!("(stub) text of {} ({} bytes)", filename, image.len()),
            confidence: 1.0,
            num_lines: 1,
            error: None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StubDetector;

#[async_trait]
impl Detector for StubDetector {
    async fn detect(
        &self,
        _filename: &str,
        _image: &[u8],
        _min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Answers classification prompts with a fixed type and everything else
/// with an empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubLlmClient;

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, CollaboratorError> {
        let text = if request.prompt.contains("DOCUMENT CATEGORIES") {
            "Договор".to_string()
        } else if request.prompt.contains("SUMMARY") {
            "(stub) summary is not available without a model".to_string()
        } else {
            String::new()
        };
        Ok(ChatReply {
            text,
            model: Some("stub".to_string()),
        })
    }
}
