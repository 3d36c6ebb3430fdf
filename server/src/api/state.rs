use docverify::AppContext;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: AppContext,
    pub app_name: String,
}
