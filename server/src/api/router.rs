//! Route table and middleware.
//!
//! Every REST route lives under the configured API prefix; `/ping` stays at
//! the root so load balancers need no configuration.

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docverify::config::ServerSettings;

use super::state::AppState;
use super::{analysis, chat, health, sessions};

pub fn build_router(state: AppState, api_prefix: &str, server: &ServerSettings) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(health::check))
        .route("/sessions", post(sessions::create).get(sessions::list))
        .route("/sessions/:id", get(sessions::get).delete(sessions::delete))
        .route("/sessions/:id/documents", get(sessions::documents))
        .route(
            "/sessions/:id/documents/labels-map",
            get(sessions::labels_map),
        )
        .route(
            "/sessions/:id/documents/:document_id",
            get(sessions::document),
        )
        .route(
            "/document-analysis/status/*document_id",
            get(analysis::status),
        )
        .route("/document-analysis/analyze", post(analysis::analyze))
        .route(
            "/document-analysis/analyze-async",
            post(analysis::analyze_async),
        )
        .route("/chat/:document_id", post(chat::ask));

    let root = Router::new().route("/ping", get(health::ping));
    let routes = if api_prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(api_prefix, api)
    };

    routes
        .with_state(state)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
