//! Browser automation endpoints.
//!
//! Every request gets its own browser: launch, navigate to `url`, perform the
//! action(s), close. Failures are reported inside the JSON envelope as
//! `code: 500`; only a missing selector is rejected up front with a 400.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::browser::{with_session, BrowserError, BrowserResult, BrowserSession, MAX_ELEMENTS};
use crate::protocol::Event;
use crate::state::AppState;
use crate::types::ApiResponse;

pub const DEFAULT_URL: &str = "https://example.com";
pub const SELECTOR_REQUIRED: &str = "需要selector参数";
pub const CLICK_OK: &str = "点击成功";
pub const INPUT_OK: &str = "输入成功";

/// Seconds to pause for a `wait` action without a value
const DEFAULT_WAIT_SECS: f64 = 1.0;

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationRequest {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    /// Raw script entries; each is parsed on its own so one malformed entry
    /// only fails that step
    #[serde(default)]
    pub actions: Vec<Value>,
}

impl AutomationRequest {
    fn selector(&self) -> Option<String> {
        self.selector.clone().filter(|s| !s.is_empty())
    }
}

/// One step of an `/api/execute` script
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub selector: Option<String>,
    /// Text for `input`, seconds for `wait`
    #[serde(default)]
    pub value: Option<Value>,
}

impl ActionSpec {
    fn value_text(&self) -> String {
        match &self.value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    fn wait_duration(&self) -> BrowserResult<Duration> {
        let secs = match &self.value {
            None | Some(Value::Null) => DEFAULT_WAIT_SECS,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_WAIT_SECS),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| BrowserError::Action(format!("Invalid wait value: {}", s)))?,
            Some(other) => {
                return Err(BrowserError::Action(format!("Invalid wait value: {}", other)))
            }
        };
        if !secs.is_finite() || secs < 0.0 {
            return Err(BrowserError::Action(format!("Invalid wait value: {}", secs)));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| BrowserError::Action(format!("Invalid wait value: {}", e)))
    }

    fn required_selector(&self) -> BrowserResult<&str> {
        self.selector
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BrowserError::Action(SELECTOR_REQUIRED.to_string()))
    }
}

fn missing_selector() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::message(400, SELECTOR_REQUIRED)),
    )
        .into_response()
}

fn failure(e: BrowserError) -> Response {
    tracing::warn!("Automation failed: {}", e);
    Json(ApiResponse::message(500, e.to_string())).into_response()
}

fn encode_png(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Push a successful automation action into the relay when enabled
async fn echo_step(state: &AppState, step: Value) {
    if state.config.echo_automation_steps {
        state.relay.broadcast(&Event::NewStep(step), None).await;
    }
}

/// POST /api/open
pub async fn open_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let timeout = state.config.nav_timeout;
    let url = req.url;

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move { page.goto(&url, timeout).await })
    })
    .await;

    match result {
        Ok(info) => {
            echo_step(&state, json!({ "action": "navigate", "url": info.url })).await;
            Json(ApiResponse::data(json!({ "title": info.title, "url": info.url }))).into_response()
        }
        Err(e) => failure(e),
    }
}

/// POST /api/screenshot
pub async fn screenshot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let timeout = state.config.nav_timeout;
    let url = req.url;

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move {
            page.goto(&url, timeout).await?;
            page.screenshot().await
        })
    })
    .await;

    match result {
        Ok(png) => Json(ApiResponse::data(json!({ "screenshot": encode_png(&png) }))).into_response(),
        Err(e) => failure(e),
    }
}

/// POST /api/click
pub async fn click(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let Some(selector) = req.selector() else {
        return missing_selector();
    };
    let timeout = state.config.nav_timeout;
    let url = req.url;
    let target = selector.clone();

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move {
            page.goto(&url, timeout).await?;
            page.click(&target).await?;
            Ok(url)
        })
    })
    .await;

    match result {
        Ok(url) => {
            echo_step(&state, json!({ "action": "click", "selector": selector, "url": url })).await;
            Json(ApiResponse::message(200, CLICK_OK)).into_response()
        }
        Err(e) => failure(e),
    }
}

/// POST /api/input
pub async fn input_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let Some(selector) = req.selector() else {
        return missing_selector();
    };
    let timeout = state.config.nav_timeout;
    let url = req.url;
    let value = req.value.unwrap_or_default();
    let (target, text) = (selector.clone(), value.clone());

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move {
            page.goto(&url, timeout).await?;
            page.fill(&target, &text).await?;
            Ok(url)
        })
    })
    .await;

    match result {
        Ok(url) => {
            let step = json!({ "action": "input", "selector": selector, "value": value, "url": url });
            echo_step(&state, step).await;
            Json(ApiResponse::message(200, INPUT_OK)).into_response()
        }
        Err(e) => failure(e),
    }
}

/// POST /api/elements
pub async fn elements(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let timeout = state.config.nav_timeout;
    let url = req.url;

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move {
            page.goto(&url, timeout).await?;
            page.clickable_elements(MAX_ELEMENTS).await
        })
    })
    .await;

    match result {
        Ok(mut elements) => {
            elements.truncate(MAX_ELEMENTS);
            let count = elements.len();
            Json(ApiResponse::data(json!({ "elements": elements, "count": count }))).into_response()
        }
        Err(e) => failure(e),
    }
}

/// Run a scripted sequence of actions on one page.
///
/// POST /api/execute
///
/// A failing action is recorded and the script carries on; only a failed
/// launch or initial navigation fails the whole request.
pub async fn execute_actions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutomationRequest>,
) -> Response {
    let timeout = state.config.nav_timeout;
    let url = req.url;
    let actions = req.actions;

    let result = with_session(state.browser.as_ref(), move |page| {
        Box::pin(async move {
            let info = page.goto(&url, timeout).await?;
            let mut results = vec![json!({ "action": "open", "success": true, "title": info.title })];
            for action in &actions {
                results.push(run_action(page, action).await);
            }
            Ok(results)
        })
    })
    .await;

    match result {
        Ok(results) => Json(ApiResponse::data(json!({ "results": results }))).into_response(),
        Err(e) => failure(e),
    }
}

async fn run_action(page: &mut dyn BrowserSession, raw: &Value) -> Value {
    let action: ActionSpec = match serde_json::from_value(raw.clone()) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!("Skipping malformed action {}: {}", raw, e);
            let kind = raw.get("type").cloned().unwrap_or(Value::Null);
            return json!({
                "action": kind,
                "success": false,
                "error": format!("Invalid action: {}", e)
            });
        }
    };

    let outcome: BrowserResult<Option<Value>> = async {
        match action.kind.as_str() {
            "click" => {
                page.click(action.required_selector()?).await?;
                Ok(None)
            }
            "input" => {
                page.fill(action.required_selector()?, &action.value_text()).await?;
                Ok(None)
            }
            "wait" => {
                tokio::time::sleep(action.wait_duration()?).await;
                Ok(None)
            }
            "screenshot" => {
                let png = page.screenshot().await?;
                Ok(Some(json!(encode_png(&png))))
            }
            other => Err(BrowserError::Action(format!("Unsupported action: {}", other))),
        }
    }
    .await;

    match outcome {
        Ok(None) => json!({ "action": action.kind, "success": true }),
        Ok(Some(screenshot)) => {
            json!({ "action": action.kind, "success": true, "screenshot": screenshot })
        }
        Err(e) => {
            tracing::debug!("Action {} failed: {}", action.kind, e);
            json!({ "action": action.kind, "success": false, "error": e.to_string() })
        }
    }
}
