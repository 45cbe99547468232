//! Environment-driven server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 5001;
pub const DEFAULT_WS_PORT: u16 = 5002;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    /// HTTP API, socket channel and static files
    pub http_port: u16,
    /// Native WebSocket listener
    pub ws_port: u16,
    pub static_dir: PathBuf,
    pub extension_zip: PathBuf,
    /// Per-client outbound queue length before the client is evicted
    pub client_queue_capacity: usize,
    pub nav_timeout: Duration,
    pub node_bin: PathBuf,
    /// Override for the Playwright bridge script (embedded copy used if None)
    pub playwright_bridge: Option<PathBuf>,
    /// Push successful automation actions into the relay as steps
    pub echo_automation_steps: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            static_dir: PathBuf::from("static"),
            extension_zip: PathBuf::from("extension.zip"),
            client_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            nav_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            node_bin: PathBuf::from("node"),
            playwright_bridge: None,
            echo_automation_steps: false,
        }
    }
}

impl RelayConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let client_queue_capacity = parse_var("CLIENT_QUEUE_CAPACITY")
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.client_queue_capacity);

        Self {
            bind_addr: parse_var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            http_port: parse_var("HTTP_PORT").unwrap_or(defaults.http_port),
            ws_port: parse_var("WS_PORT").unwrap_or(defaults.ws_port),
            static_dir: path_var("STATIC_DIR").unwrap_or(defaults.static_dir),
            extension_zip: path_var("EXTENSION_ZIP").unwrap_or(defaults.extension_zip),
            client_queue_capacity,
            nav_timeout: parse_var("NAV_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.nav_timeout),
            node_bin: path_var("NODE_BIN").unwrap_or(defaults.node_bin),
            playwright_bridge: path_var("PLAYWRIGHT_BRIDGE"),
            echo_automation_steps: std::env::var("ECHO_AUTOMATION_STEPS")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(defaults.echo_automation_steps),
        }
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.ws_port)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
