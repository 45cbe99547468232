use crate::browser::{BrowserDriver, PlaywrightConfig, PlaywrightDriver};
use crate::config::RelayConfig;
use crate::registry::ClientRegistry;
use crate::relay::Relay;
use std::sync::Arc;

/// Shared application state, injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub browser: Arc<dyn BrowserDriver>,
    pub config: RelayConfig,
}

impl AppState {
    pub fn new(config: RelayConfig, browser: Arc<dyn BrowserDriver>) -> Self {
        Self {
            relay: Relay::new(ClientRegistry::new()),
            browser,
            config,
        }
    }

    /// State backed by the Playwright bridge
    pub fn from_config(config: RelayConfig) -> Self {
        let driver = PlaywrightDriver::new(PlaywrightConfig {
            node_bin: config.node_bin.clone(),
            bridge_script: config.playwright_bridge.clone(),
            call_timeout: config.nav_timeout,
        });
        Self::new(config, Arc::new(driver))
    }

    pub fn registry(&self) -> &ClientRegistry {
        self.relay.registry()
    }
}
