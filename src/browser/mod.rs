//! Headless browser control.
//!
//! Each automation request launches a fresh browser, runs its actions and
//! closes it again. Nothing is shared between requests.

mod playwright;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use playwright::{PlaywrightConfig, PlaywrightDriver};

/// Elements considered clickable when enumerating a page
pub const CLICKABLE_SELECTOR: &str = r#"a, button, input[type="submit"], [onclick]"#;

/// Maximum number of elements returned by an enumeration
pub const MAX_ELEMENTS: usize = 20;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("{0}")]
    Action(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Browser bridge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BrowserError {
    fn from(e: serde_json::Error) -> Self {
        BrowserError::Bridge(format!("JSON error: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementInfo {
    pub tag: String,
    pub text: String,
    pub id: String,
    pub name: String,
    pub class: String,
}

/// Launches browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// One launched browser with a single open page
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the network to go idle
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<PageInfo>;

    async fn click(&mut self, selector: &str) -> BrowserResult<()>;

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;

    /// Up to `limit` elements matching [`CLICKABLE_SELECTOR`]
    async fn clickable_elements(&mut self, limit: usize) -> BrowserResult<Vec<ElementInfo>>;

    /// Close the page and the browser
    async fn close(&mut self) -> BrowserResult<()>;
}

/// Launch a session, run `f` against it and close it on every exit path.
///
/// A close failure is only logged; the result of `f` wins.
pub async fn with_session<T, F>(driver: &dyn BrowserDriver, f: F) -> BrowserResult<T>
where
    F: for<'a> FnOnce(&'a mut dyn BrowserSession) -> BoxFuture<'a, BrowserResult<T>>,
{
    let mut session = driver.launch().await?;
    let result = f(session.as_mut()).await;
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }
    result
}
