//! API error type with structured JSON responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use docverify::analysis::AnalysisError;
use docverify::chat::ChatError;
use docverify::error::{CollaboratorError, StorageError};
use docverify::sessions::SessionError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", detail),
            ApiError::Unprocessable(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", detail)
            }
            ApiError::ServiceUnavailable(detail) => {
                tracing::warn!(detail = %detail, "upstream service failed");
                (StatusCode::BAD_GATEWAY, "SERVICE_UNAVAILABLE", detail)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Maps a collaborator failure by kind, keeping the full message.
fn collaborator(err: &CollaboratorError, message: String) -> ApiError {
    match err {
        CollaboratorError::Unauthorized { .. } => ApiError::Unauthorized(message),
        CollaboratorError::Unreachable { .. }
        | CollaboratorError::Status { .. }
        | CollaboratorError::InvalidResponse { .. } => ApiError::ServiceUnavailable(message),
        CollaboratorError::NotConfigured { .. } | CollaboratorError::ClientBuild { .. } => {
            ApiError::Internal(message)
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoFiles | SessionError::NoPdfs | SessionError::Archive(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::SessionNotFound(_) | SessionError::DocumentNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            SessionError::Database(e) => ApiError::Internal(e.to_string()),
            SessionError::Task(reason) => ApiError::Internal(reason),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        let message = err.to_string();
        match &err {
            AnalysisError::InvalidDocumentId(_) => ApiError::BadRequest(message),
            AnalysisError::DocumentNotFound(_) => ApiError::NotFound(message),
            AnalysisError::AlreadyRunning(_) => ApiError::Conflict(message),
            AnalysisError::Download(StorageError::NotFound(_)) => ApiError::NotFound(message),
            AnalysisError::Download(_) => ApiError::ServiceUnavailable(message),
            AnalysisError::EmptyText => ApiError::Unprocessable(message),
            AnalysisError::Ocr(source) | AnalysisError::Llm { source, .. } => {
                collaborator(source, message)
            }
            AnalysisError::Database(_) => ApiError::Internal(message),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match &err {
            ChatError::InvalidDocumentId(_) | ChatError::EmptyMessage => {
                ApiError::BadRequest(message)
            }
            ChatError::DocumentNotFound(_) => ApiError::NotFound(message),
            ChatError::Llm(source) => collaborator(source, message),
            ChatError::Database(_) => ApiError::Internal(message),
        }
    }
}
