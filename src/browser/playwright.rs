//! Playwright driven through a Node.js child process.
//!
//! Every session is its own `node` process running the bridge script. Requests
//! and responses are single JSON lines on stdin/stdout, matched by `id`.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{
    BrowserDriver, BrowserError, BrowserResult, BrowserSession, ElementInfo, PageInfo,
    CLICKABLE_SELECTOR,
};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Slack on top of the navigation timeout before the bridge itself is
/// considered unresponsive
const BRIDGE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub node_bin: PathBuf,
    /// Script file to run instead of the embedded bridge
    pub bridge_script: Option<PathBuf>,
    /// Upper bound for any single non-navigation call
    pub call_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_bin: PathBuf::from("node"),
            bridge_script: None,
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
}

impl PlaywrightDriver {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.node_bin);
        match &self.config.bridge_script {
            Some(path) => {
                cmd.arg(path);
            }
            None => {
                cmd.arg("-e").arg(BRIDGE_SCRIPT);
            }
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        let mut child = self.command().spawn().map_err(|e| {
            BrowserError::Launch(format!(
                "failed to start {}: {}",
                self.config.node_bin.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrowserError::Launch("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrowserError::Launch("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("[playwright bridge] {}", line);
                }
            });
        }

        let mut session = PlaywrightSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            call_timeout: self.config.call_timeout,
            closed: false,
        };

        session
            .call("launch", json!({ "headless": true }), session.call_timeout)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        tracing::debug!("Playwright session launched");
        Ok(Box::new(session))
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BridgeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    message: String,
}

struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    call_timeout: Duration,
    closed: bool,
}

impl PlaywrightSession {
    async fn call(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> BrowserResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&BridgeRequest { id, method, params })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        match tokio::time::timeout(timeout, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(timeout)),
        }
    }

    async fn read_response(&mut self, id: u64) -> BrowserResult<Value> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(BrowserError::Bridge("bridge process exited".to_string()));
            };
            if line.trim().is_empty() {
                continue;
            }

            let response: BridgeResponse = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(_) => {
                    tracing::debug!("Ignoring bridge output: {}", line);
                    continue;
                }
            };
            if response.id != id {
                tracing::debug!("Ignoring stale bridge response {}", response.id);
                continue;
            }

            return match response.error {
                Some(err) => Err(BrowserError::Action(err.message)),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
        }
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<PageInfo> {
        let params = json!({ "url": url, "timeout": timeout.as_millis() as u64 });
        let result = self
            .call("goto", params, timeout + BRIDGE_GRACE)
            .await
            .map_err(|e| match e {
                BrowserError::Action(msg) => BrowserError::Navigation(msg),
                other => other,
            })?;
        Ok(serde_json::from_value(result)?)
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.call("click", json!({ "selector": selector }), self.call_timeout)
            .await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        let params = json!({ "selector": selector, "value": value });
        self.call("fill", params, self.call_timeout).await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        let result = self.call("screenshot", json!({}), self.call_timeout).await?;
        let encoded = result
            .as_str()
            .ok_or_else(|| BrowserError::Bridge("screenshot is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Bridge(format!("invalid screenshot data: {}", e)))
    }

    async fn clickable_elements(&mut self, limit: usize) -> BrowserResult<Vec<ElementInfo>> {
        let params = json!({ "selector": CLICKABLE_SELECTOR, "limit": limit });
        let result = self.call("elements", params, self.call_timeout).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.call("close", json!({}), self.call_timeout).await;
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Bridge process already gone: {}", e);
        }
        result.map(|_| ())
    }
}
