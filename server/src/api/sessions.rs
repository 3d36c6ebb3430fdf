//! Session and document endpoints.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use docverify::dto::{SessionDocumentDetailsDto, SessionDocumentDto, SessionDto};
use docverify::labels::LabelsMap;
use docverify::processor::UploadedFile;
use docverify::{DocumentStatus, SessionStatus};

use super::error::ApiError;
use super::extract::{ApiPath, ApiQuery};
use super::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    fn parse<T: std::str::FromStr>(&self) -> Result<Option<T>, ApiError>
    where
        T::Err: std::fmt::Display,
    {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ApiError::BadRequest(e.to_string())),
            None => Ok(None),
        }
    }
}

/// `POST /sessions`: multipart upload of PDFs and ZIP archives.
///
/// Files may be sent under `files` (repeatable) or `file`; other fields are
/// ignored.
pub async fn create(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<SessionDto>), ApiError> {
    let mut multipart = multipart?;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field.bytes().await?;
        files.push(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    let created = state.ctx.sessions.create(files).await?;
    Ok((StatusCode::CREATED, Json(created.session)))
}

/// `GET /sessions?status=`
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Vec<SessionDto>>, ApiError> {
    let status = query.parse::<SessionStatus>()?;
    Ok(Json(state.ctx.sessions.list(status)?))
}

/// `GET /sessions/:id`
pub async fn get(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
) -> Result<Json<SessionDto>, ApiError> {
    Ok(Json(state.ctx.sessions.get(session_id)?))
}

/// `DELETE /sessions/:id`
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.ctx.sessions.delete(session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /sessions/:id/documents?status=`
pub async fn documents(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Vec<SessionDocumentDto>>, ApiError> {
    let status = query.parse::<DocumentStatus>()?;
    Ok(Json(state.ctx.sessions.documents(session_id, status)?))
}

/// `GET /sessions/:id/documents/labels-map`
pub async fn labels_map(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<i64>,
) -> Result<Json<LabelsMap>, ApiError> {
    Ok(Json(state.ctx.sessions.labels_map(session_id)?))
}

/// `GET /sessions/:id/documents/:document_id`
pub async fn document(
    State(state): State<AppState>,
    ApiPath((session_id, document_id)): ApiPath<(i64, i64)>,
) -> Result<Json<SessionDocumentDetailsDto>, ApiError> {
    Ok(Json(state.ctx.sessions.document(session_id, document_id)?))
}
