//! Text analysis of labeled documents: OCR over the stored page images,
//! then fraud, spelling, classification and summary passes through the LLM.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::analysis_repo::AnalysisRow;
use crate::db::DatabaseError;
use crate::error::{CollaboratorError, StorageError};
use crate::models::AnalysisStatus;

mod orchestrator;
pub mod parse;
pub mod prompts;

pub use orchestrator::{AnalysisJob, DocumentAnalyzer};

/// One LLM pass over the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisTask {
    Fraud,
    Spelling,
    Classification,
    Summary,
}

impl AnalysisTask {
    pub const DEFAULT: [AnalysisTask; 3] = [
        AnalysisTask::Fraud,
        AnalysisTask::Spelling,
        AnalysisTask::Classification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisTask::Fraud => "fraud",
            AnalysisTask::Spelling => "spelling",
            AnalysisTask::Classification => "classification",
            AnalysisTask::Summary => "summary",
        }
    }

    /// Requested tasks without duplicates; the default set when none given.
    pub fn normalize(requested: &[AnalysisTask]) -> Vec<AnalysisTask> {
        if requested.is_empty() {
            return Self::DEFAULT.to_vec();
        }
        let mut tasks = Vec::with_capacity(requested.len());
        for task in requested {
            if !tasks.contains(task) {
                tasks.push(*task);
            }
        }
        tasks
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Analysis already in progress for document {0}")]
    AlreadyRunning(i64),

    #[error("Failed to download images: {0}")]
    Download(#[source] StorageError),

    #[error("Failed to extract text from images: {0}")]
    Ocr(#[source] CollaboratorError),

    #[error("Failed to extract text from images: No text could be extracted from any images")]
    EmptyText,

    #[error("Failed to analyze text with LLM: {task} failed: {source}")]
    Llm {
        task: &'static str,
        #[source]
        source: CollaboratorError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Accepts `7` as well as path-like ids such as `sessions/3/documents/7`.
pub fn parse_document_id(raw: &str) -> Result<i64, AnalysisError> {
    let candidate = raw.trim().trim_end_matches('/').rsplit('/').next().unwrap_or("");
    match candidate.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AnalysisError::InvalidDocumentId(raw.to_string())),
    }
}

/// Externally visible analysis state, including the "never started" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    NotFound,
    Processing,
    Completed,
    Failed,
}

impl From<AnalysisStatus> for AnalysisState {
    fn from(status: AnalysisStatus) -> Self {
        match status {
            AnalysisStatus::Processing => AnalysisState::Processing,
            AnalysisStatus::Completed => AnalysisState::Completed,
            AnalysisStatus::Failed => AnalysisState::Failed,
        }
    }
}

/// Body of the analysis status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatusView {
    pub status: AnalysisState,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_sentences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mistake_words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
}

impl AnalysisStatusView {
    pub fn not_found(document_id: i64) -> Self {
        Self {
            status: AnalysisState::NotFound,
            document_id: document_id.to_string(),
            message: Some("No analysis found for this document".to_string()),
            fraud_sentences: None,
            mistake_words: None,
            document_type: None,
            document_summary: None,
            error_log: None,
        }
    }

    /// Results are only exposed for completed runs, the error log only for
    /// failed ones.
    pub fn from_row(row: &AnalysisRow) -> Self {
        let mut view = Self {
            status: row.status.into(),
            document_id: row.document_id.to_string(),
            message: None,
            fraud_sentences: None,
            mistake_words: None,
            document_type: None,
            document_summary: None,
            error_log: None,
        };
        match row.status {
            AnalysisStatus::Completed => {
                view.fraud_sentences = Some(row.fraud_sentences.clone());
                view.mistake_words = Some(row.mistake_words.clone());
                view.document_type = row.document_type.clone();
                view.document_summary = row.document_summary.clone();
            }
            AnalysisStatus::Failed => view.error_log = row.error_log.clone(),
            AnalysisStatus::Processing => {}
        }
        view
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            AnalysisState::Completed | AnalysisState::Failed | AnalysisState::NotFound
        )
    }
}
