//! Remote collaborators: OCR, visual marker detection and the LLM.
//!
//! Each is a trait so the services can run against the HTTP implementations,
//! the in-process stubs, or scripted fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CollaboratorSettings;
use crate::error::CollaboratorError;

mod http;
mod stub;

pub use http::{HttpDetector, HttpLlmClient, HttpOcrClient};
pub(crate) use http::truncate_body;
pub use stub::{StubDetector, StubLlmClient, StubOcrClient};

/// Marker categories that drive the verification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionCategory {
    Qr,
    Stamp,
    Signature,
}

impl DetectionCategory {
    pub const ALL: [DetectionCategory; 3] = [
        DetectionCategory::Qr,
        DetectionCategory::Stamp,
        DetectionCategory::Signature,
    ];

    /// Maps a detector label to a known category.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "qr" | "qr_code" | "qrcode" | "qr-code" => Some(DetectionCategory::Qr),
            "stamp" => Some(DetectionCategory::Stamp),
            "signature" => Some(DetectionCategory::Signature),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionCategory::Qr => "qr",
            DetectionCategory::Stamp => "stamp",
            DetectionCategory::Signature => "signature",
        }
    }
}

/// A detected region in page pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

impl Detection {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn kind(&self) -> Option<DetectionCategory> {
        DetectionCategory::from_label(&self.category)
    }
}

/// Text recognized on one page image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrPage {
    pub filename: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub num_lines: u32,
    #[serde(default)]
    pub error: Option<String>,
}

/// A single-prompt completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens,
            temperature,
            top_p: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub model: Option<String>,
}

#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn extract_text(&self, filename: &str, image: &[u8]) -> Result<OcrPage, CollaboratorError>;
}

#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        filename: &str,
        image: &[u8],
        min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, CollaboratorError>;
}

/// The set of collaborators the services are wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub ocr: Arc<dyn OcrClient>,
    pub detector: Arc<dyn Detector>,
    pub llm: Arc<dyn LlmClient>,
}

impl Collaborators {
    pub fn from_settings(settings: &CollaboratorSettings) -> Result<Self, CollaboratorError> {
        if settings.use_stub {
            tracing::warn!("using stub collaborators; OCR, detection and LLM output is synthetic");
            return Ok(Self::stub());
        }

        let endpoint = |value: &Option<String>, service: &'static str| {
            value
                .clone()
                .ok_or(CollaboratorError::NotConfigured { service })
        };

        Ok(Self {
            ocr: Arc::new(HttpOcrClient::new(
                endpoint(&settings.ocr_endpoint, "OCR")?,
                settings.ocr_timeout,
            )?),
            detector: Arc::new(HttpDetector::new(
                endpoint(&settings.detector_endpoint, "Detector")?,
                settings.ocr_timeout,
            )?),
            llm: Arc::new(HttpLlmClient::new(
                endpoint(&settings.llm_endpoint, "LLM")?,
                settings.llm_timeout,
            )?),
        })
    }

    pub fn stub() -> Self {
        Self {
            ocr: Arc::new(StubOcrClient),
            detector: Arc::new(StubDetector),
            llm: Arc::new(StubLlmClient),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_category_labels() {
        assert_eq!(DetectionCategory::from_label("QR"), Some(DetectionCategory::Qr));
        assert_eq!(
            DetectionCategory::from_label("qr_code"),
            Some(DetectionCategory::Qr)
        );
        assert_eq!(
            DetectionCategory::from_label(" signature "),
            Some(DetectionCategory::Signature)
        );
        assert_eq!(DetectionCategory::from_label("logo"), None);
    }

    #[test]
    fn test_detection_area() {
        let d = Detection {
            category: "stamp".into(),
            x: 0.0,
            y: 0.0,
            width: 20.0,
            height: 10.0,
            confidence: 0.5,
        };
        assert_eq!(d.area(), 200.0);
        assert_eq!(d.kind(), Some(DetectionCategory::Stamp));
    }

    #[test]
    fn test_chat_request_omits_unset_fields() {
        let json = serde_json::to_value(ChatRequest::new("hi", 512, 0.3)).unwrap();
        assert_eq!(json["prompt"], "hi");
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("system_prompt").is_none());
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_from_settings_requires_endpoints() {
        let settings = CollaboratorSettings {
            use_stub: false,
            llm_endpoint: Some("http://llm".into()),
            ocr_endpoint: None,
            detector_endpoint: Some("http://det".into()),
            llm_timeout: Duration::from_secs(1),
            ocr_timeout: Duration::from_secs(1),
        };
        let err = Collaborators::from_settings(&settings).err().unwrap();
        assert!(matches!(err, CollaboratorError::NotConfigured { service: "OCR" }));
    }

    #[test]
    fn test_from_settings_stub_mode() {
        let settings = CollaboratorSettings {
            use_stub: true,
            llm_endpoint: None,
            ocr_endpoint: None,
            detector_endpoint: None,
            llm_timeout: Duration::from_secs(1),
            ocr_timeout: Duration::from_secs(1),
        };
        assert!(Collaborators::from_settings(&settings).is_ok());
    }
}
