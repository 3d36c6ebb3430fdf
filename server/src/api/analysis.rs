//! Document analysis endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use docverify::dto::{AnalysisStartedDto, AnalyzeRequest};
use docverify::models::AnalysisResults;
use docverify::AnalysisStatusView;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::state::AppState;

/// `GET /document-analysis/status/*document_id`
///
/// The id may be numeric or a document path ending in the numeric id.
pub async fn status(
    State(state): State<AppState>,
    ApiPath(document_id): ApiPath<String>,
) -> Result<Json<AnalysisStatusView>, ApiError> {
    Ok(Json(state.ctx.analyzer.status(&document_id)?))
}

/// `POST /document-analysis/analyze`: runs to completion before replying.
pub async fn analyze(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<Json<AnalysisResults>, ApiError> {
    let results = state
        .ctx
        .analyzer
        .analyze(&request.document_id, &request.tasks)
        .await?;
    Ok(Json(results))
}

/// `POST /document-analysis/analyze-async`: records the run, then continues
/// in the background.
pub async fn analyze_async(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<(StatusCode, Json<AnalysisStartedDto>), ApiError> {
    let analyzer = state.ctx.analyzer.clone();
    let job = analyzer.start(&request.document_id, &request.tasks)?;
    let document_id = job.document_id;

    tokio::spawn(async move {
        if let Err(e) = analyzer.run(job).await {
            tracing::warn!(document_id, error = %e, "background analysis failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisStartedDto::processing(document_id)),
    ))
}
