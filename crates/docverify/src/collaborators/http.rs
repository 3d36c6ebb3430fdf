//! reqwest-backed collaborator clients.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ChatReply, ChatRequest, Detection, Detector, LlmClient, OcrClient, OcrPage};
use crate::error::CollaboratorError;

/// Maximum length of a remote error body kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

pub(crate) fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

/// A JSON-over-HTTP endpoint with shared error mapping.
#[derive(Debug, Clone)]
struct JsonEndpoint {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl JsonEndpoint {
    fn new(
        service: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|source| CollaboratorError::ClientBuild { service, source })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let service = self.service;

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| CollaboratorError::Unreachable { service, source })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CollaboratorError::Unauthorized { service });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(service, status = status.as_u16(), "collaborator returned an error");
            return Err(CollaboratorError::Status {
                service,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|source| CollaboratorError::Unreachable { service, source })?;
        serde_json::from_str(&text).map_err(|e| CollaboratorError::InvalidResponse {
            service,
            reason: format!("{}: {}", e, truncate_body(&text)),
        })
    }
}

#[derive(Serialize)]
struct ImagePayload<'a> {
    filename: &'a str,
    image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conf_threshold: Option<f64>,
}

/// OCR service client: `POST {base}/extract`.
#[derive(Debug, Clone)]
pub struct HttpOcrClient {
    endpoint: JsonEndpoint,
}

impl HttpOcrClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: JsonEndpoint::new("OCR", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn extract_text(&self, filename: &str, image: &[u8]) -> Result<OcrPage, CollaboratorError> {
        let payload = ImagePayload {
            filename,
            image_base64: BASE64.encode(image),
            conf_threshold: None,
        };
        let page: OcrPage = self.endpoint.post("extract", &payload).await?;
        if let Some(error) = page.error.as_deref().filter(|e| !e.is_empty()) {
            tracing::warn!(filename, error, "OCR reported a page error");
        }
        Ok(page)
    }
}

/// Visual marker detector client: `POST {base}/detect`.
#[derive(Debug, Clone)]
pub struct HttpDetector {
    endpoint: JsonEndpoint,
}

impl HttpDetector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: JsonEndpoint::new("Detector", base_url, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        filename: &str,
        image: &[u8],
        min_confidence: f64,
    ) -> Result<Vec<Detection>, CollaboratorError> {
        let payload = ImagePayload {
            filename,
            image_base64: BASE64.encode(image),
            conf_threshold: Some(min_confidence),
        };
        let response: DetectResponse = self.endpoint.post("detect", &payload).await?;
        Ok(response.detections)
    }
}

/// LLM service client: `POST {base}/chat`.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    endpoint: JsonEndpoint,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: JsonEndpoint::new("LLM", base_url, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    response: Option<String>,
    answer: Option<String>,
    model: Option<String>,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, CollaboratorError> {
        let response: ChatResponse = self.endpoint.post("chat", request).await?;
        let text = response
            .response
            .or(response.answer)
            .ok_or(CollaboratorError::InvalidResponse {
                service: "LLM",
                reason: "response has neither 'response' nor 'answer'".into(),
            })?;
        Ok(ChatReply {
            text,
            model: response.model,
        })
    }
}
