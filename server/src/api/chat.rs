use axum::extract::State;
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::HeaderMap;
use axum::Json;

use docverify::chat::ChatAnswer;
use docverify::dto::ChatMessageDto;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::state::AppState;

/// `POST /chat/:document_id`: answers in the language of `Accept-Language`.
pub async fn ask(
    State(state): State<AppState>,
    ApiPath(document_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<ChatMessageDto>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let language = headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let answer = state
        .ctx
        .chat
        .answer(&document_id, &body.message, language)
        .await?;
    Ok(Json(answer))
}
