//! HTTP endpoints feeding the relay.
//!
//! These are used by the browser extension's background process, which has no
//! socket of its own, and by dashboards polling the connection count.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::protocol::Event;
use crate::state::AppState;
use crate::types::ApiResponse;

/// File name offered to the browser when downloading the extension
pub const EXTENSION_DOWNLOAD_NAME: &str = "web-recorder-extension.zip";

#[derive(Debug, Deserialize)]
pub struct PushStepRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

/// Relay a recorded step pushed by the extension.
///
/// POST /api/push-step
pub async fn push_step(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PushStepRequest>,
) -> Json<ApiResponse> {
    let data = req.data.unwrap_or_else(|| json!({}));
    tracing::info!("Step pushed: {:?}", data.get("action"));

    state.relay.broadcast(&Event::NewStep(data), None).await;
    Json(ApiResponse::ok())
}

/// Relay a recording status change verbatim.
///
/// POST /api/recording-status
pub async fn recording_status(
    State(state): State<Arc<AppState>>,
    Json(status): Json<Value>,
) -> Json<ApiResponse> {
    tracing::info!("Recording status: {}", status);

    state.relay.broadcast(&Event::RecordingStatus(status), None).await;
    Json(ApiResponse::ok())
}

/// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let count = state.registry().len().await;
    Json(ApiResponse::data(json!({ "connectedClients": count })))
}

/// Download the packaged browser extension.
///
/// GET /api/extension
pub async fn download_extension(State(state): State<Arc<AppState>>) -> Response {
    let path = &state.config.extension_zip;
    match tokio::fs::read(path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXTENSION_DOWNLOAD_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Extension package {} unavailable: {}", path.display(), e);
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::message(404, "extension package not found")),
            )
                .into_response()
        }
    }
}
