//! HTTP client for the REST API plus the polling helpers a viewer needs.

mod poll;
mod progress;

pub use poll::{poll_until, PollError, PollOptions, DEFAULT_POLL_INTERVAL};
pub use progress::SessionProgress;

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::analysis::{AnalysisStatusView, AnalysisTask};
use crate::chat::ChatAnswer;
use crate::collaborators::truncate_body;
use crate::dto::{
    AnalysisStartedDto, AnalyzeRequest, ChatMessageDto, SessionDocumentDetailsDto,
    SessionDocumentDto, SessionDto,
};
use crate::labels::LabelsMap;
use crate::models::{DocumentStatus, SessionStatus};
use crate::processor::UploadedFile;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Client bound to one API base URL, e.g. `http://127.0.0.1:8000/api/v1`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => ("UNKNOWN".to_string(), truncate_body(&body)),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    /// Uploads PDFs and ZIP archives as a new session.
    pub async fn create_session(&self, files: Vec<UploadedFile>) -> Result<SessionDto, ClientError> {
        let mut form = Form::new();
        for file in files {
            let mime = mime_guess::from_path(&file.filename).first_or_octet_stream();
            let part = Part::bytes(file.bytes)
                .file_name(file.filename)
                .mime_str(mime.as_ref())?;
            form = form.part("files", part);
        }
        Self::send(self.http.post(self.url("sessions")).multipart(form)).await
    }

    pub async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionDto>, ClientError> {
        let mut request = self.http.get(self.url("sessions"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        Self::send(request).await
    }

    pub async fn session(&self, session_id: i64) -> Result<SessionDto, ClientError> {
        Self::send(self.http.get(self.url(&format!("sessions/{session_id}")))).await
    }

    pub async fn delete_session(&self, session_id: i64) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("sessions/{session_id}")))
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status,
            code: "UNKNOWN".to_string(),
            message: truncate_body(&body),
        })
    }

    pub async fn documents(
        &self,
        session_id: i64,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<SessionDocumentDto>, ClientError> {
        let mut request = self
            .http
            .get(self.url(&format!("sessions/{session_id}/documents")));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        Self::send(request).await
    }

    pub async fn document(
        &self,
        session_id: i64,
        document_id: i64,
    ) -> Result<SessionDocumentDetailsDto, ClientError> {
        Self::send(
            self.http
                .get(self.url(&format!("sessions/{session_id}/documents/{document_id}"))),
        )
        .await
    }

    pub async fn labels_map(&self, session_id: i64) -> Result<LabelsMap, ClientError> {
        Self::send(
            self.http
                .get(self.url(&format!("sessions/{session_id}/documents/labels-map"))),
        )
        .await
    }

    pub async fn analysis_status(&self, document_id: i64) -> Result<AnalysisStatusView, ClientError> {
        Self::send(
            self.http
                .get(self.url(&format!("document-analysis/status/{document_id}"))),
        )
        .await
    }

    pub async fn start_analysis(
        &self,
        document_id: i64,
        tasks: &[AnalysisTask],
    ) -> Result<AnalysisStartedDto, ClientError> {
        let body = AnalyzeRequest {
            document_id: document_id.to_string(),
            tasks: tasks.to_vec(),
        };
        Self::send(
            self.http
                .post(self.url("document-analysis/analyze-async"))
                .json(&body),
        )
        .await
    }

    pub async fn chat(
        &self,
        document_id: i64,
        message: &str,
        language: Option<&str>,
    ) -> Result<ChatAnswer, ClientError> {
        let mut request = self
            .http
            .post(self.url(&format!("chat/{document_id}")))
            .json(&ChatMessageDto {
                message: message.to_string(),
            });
        if let Some(language) = language {
            request = request.header(reqwest::header::ACCEPT_LANGUAGE, language);
        }
        Self::send(request).await
    }
}
