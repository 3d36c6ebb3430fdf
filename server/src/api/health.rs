//! Liveness endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub version: &'static str,
}

/// `GET /ping`, outside the API prefix.
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET {prefix}/health`
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.app_name,
        version: env!("CARGO_PKG_VERSION"),
    })
}
