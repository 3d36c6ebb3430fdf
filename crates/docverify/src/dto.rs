//! JSON shapes returned by the REST API and read back by [`crate::client`].

use serde::{Deserialize, Serialize};

use crate::db::document_repo::DocumentRow;
use crate::db::session_repo::SessionRow;
use crate::analysis::AnalysisTask;
use crate::labels::LabelsPosition;
use crate::models::{DocumentStatus, SessionStatus, Verification};
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub id: i64,
    pub total_documents: u32,
    /// Documents in a terminal state, failed ones included.
    pub completed_count: u32,
    pub failed_count: u32,
    pub status: SessionStatus,
    pub is_complete: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&SessionRow> for SessionDto {
    fn from(row: &SessionRow) -> Self {
        Self {
            id: row.id,
            total_documents: row.documents_count,
            completed_count: row.finished_count(),
            failed_count: row.failed_count,
            status: row.status,
            is_complete: row.is_complete(),
            created_at: row.created_at.clone(),
            updated_at: row.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocumentDto {
    pub id: i64,
    pub document_url: String,
    pub original_name: String,
    pub status: DocumentStatus,
    pub created_at: String,
    pub updated_at: String,
    pub verification: Verification,
}

impl SessionDocumentDto {
    pub fn from_row(row: &DocumentRow) -> Self {
        Self::with_labels(row, decode_labels(row).as_ref())
    }

    fn with_labels(row: &DocumentRow, labels: Option<&LabelsPosition>) -> Self {
        let document_url = labels
            .map(|l| l.artifacts.original_pdf_url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| storage::document_key(row.session_id, row.id));
        Self {
            id: row.id,
            document_url,
            original_name: row.original_name.clone(),
            status: row.status,
            created_at: row.created_at.clone(),
            updated_at: row.updated_at.clone(),
            verification: row.verification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocumentDetailsDto {
    #[serde(flatten)]
    pub document: SessionDocumentDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labeled_document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_position: Option<LabelsPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionDocumentDetailsDto {
    pub fn from_row(row: &DocumentRow) -> Self {
        let labels = decode_labels(row);
        Self {
            document: SessionDocumentDto::with_labels(row, labels.as_ref()),
            labeled_document_url: labels
                .as_ref()
                .and_then(|l| l.artifacts.labeled_pdf_url.clone()),
            labels_position: labels,
            error: row.error.clone(),
        }
    }
}

/// Body of both analyze endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub document_id: String,
    #[serde(default)]
    pub tasks: Vec<AnalysisTask>,
}

/// Returned by the background analyze endpoint once the run is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStartedDto {
    pub message: String,
    pub document_id: String,
    pub status: String,
}

impl AnalysisStartedDto {
    pub fn processing(document_id: i64) -> Self {
        Self {
            message: "Analysis started".to_string(),
            document_id: document_id.to_string(),
            status: "PROCESSING".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub message: String,
}

/// A stored payload that no longer decodes is reported as absent.
pub fn decode_labels(row: &DocumentRow) -> Option<LabelsPosition> {
    let raw = row.labels_position.as_deref()?;
    match serde_json::from_str(raw) {
        Ok(labels) => Some(labels),
        Err(e) => {
            tracing::warn!(document_id = row.id, error = %e, "undecodable labels payload");
            None
        }
    }
}
