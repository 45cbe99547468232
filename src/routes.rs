use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{api, automation, state::AppState, ws};

/// HTTP API, socket channel and static recorder page
pub fn http_router(state: Arc<AppState>) -> Router {
    let relay_routes = Router::new()
        .route("/api/push-step", post(api::push_step))
        .route("/api/recording-status", post(api::recording_status))
        .route("/api/status", get(api::status))
        .route("/api/extension", get(api::download_extension))
        .route("/socket", get(ws::channel_handler));

    let automation_routes = Router::new()
        .route("/api/open", post(automation::open_url))
        .route("/api/screenshot", post(automation::screenshot))
        .route("/api/click", post(automation::click))
        .route("/api/input", post(automation::input_text))
        .route("/api/elements", post(automation::elements))
        .route("/api/execute", post(automation::execute_actions));

    let static_dir = state.config.static_dir.clone();

    Router::new()
        .merge(relay_routes)
        .merge(automation_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Plain WebSocket listener, served on its own port
pub fn ws_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws::native_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
