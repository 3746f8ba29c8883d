//! Page driver capability.
//!
//! Traversal and extraction never talk to a browser directly. They go through
//! [`PageDriver`], which exposes the handful of operations the engine needs:
//! navigation with a readiness wait, scoped element queries, text and
//! attribute reads, element activation, script evaluation and timed waits.
//!
//! [`HtmlPageDriver`] implements the capability over static documents
//! fetched through a [`Fetcher`]. With the `browser` feature,
//! `BrowserPageDriver` drives a real Chromium-family browser over the
//! DevTools protocol, so scripts run, lazy content loads on scroll and
//! script-driven controls respond to clicks.

#[cfg(feature = "browser")]
mod browser;
#[cfg(feature = "browser")]
pub mod cdp;
mod fetch;
mod html;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::DriverError;

pub use fetch::{FetchConfig, FetchResult, Fetcher, StaticFetcher};
#[cfg(feature = "http")]
pub use fetch::ReqwestFetcher;
pub use html::HtmlPageDriver;
#[cfg(feature = "browser")]
pub use browser::{BrowserLaunch, BrowserPageDriver, ChromeProcess, CHROME_PATH_ENV, NETWORK_IDLE_QUIET};

/// Script that scrolls the viewport to the end of the document.
pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Script that reads the current document height.
pub const DOCUMENT_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// The DOM was parsed.
    DomContentLoaded,
    /// Outstanding network activity has quiesced.
    #[default]
    NetworkIdle,
}

impl WaitUntil {
    /// Name of the readiness condition as browsers spell it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

/// Opaque reference to an element of the currently loaded document.
///
/// Handles are only meaningful for the document generation they were taken
/// from; drivers reject them after the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    document: u64,
    node: usize,
}

impl ElementHandle {
    /// Creates a handle for `node` in document generation `document`.
    #[must_use]
    pub fn new(document: u64, node: usize) -> Self {
        Self { document, node }
    }

    /// Document generation the handle belongs to.
    #[must_use]
    pub fn document(&self) -> u64 {
        self.document
    }

    /// Driver-specific node index.
    #[must_use]
    pub fn node(&self) -> usize {
        self.node
    }
}

/// The browser-like capability the engine drives.
///
/// Queries with `scope = None` search the whole document; with
/// `Some(element)` they search that element's descendants. A query that
/// matches nothing is `Ok(None)` / an empty vector, never an error.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url` and returns once `wait_until` is satisfied.
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), DriverError>;

    /// URL of the loaded document, if any.
    fn current_url(&self) -> Option<String>;

    /// First element matching `selector`.
    async fn query_selector(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError>;

    /// All elements matching `selector`, in document order.
    async fn query_selector_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Rendered text of an element.
    async fn inner_text(&self, element: ElementHandle) -> Result<String, DriverError>;

    /// Raw attribute value, `None` when the attribute is absent.
    async fn get_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Activates an element as a click would.
    async fn click(&self, element: ElementHandle) -> Result<(), DriverError>;

    /// Evaluates an expression in the page and returns its value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError>;

    /// Scrolls to the bottom of the document.
    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await.map(|_| ())
    }

    /// Current document height in pixels.
    async fn document_height(&self) -> Result<u64, DriverError> {
        let value = self.evaluate(DOCUMENT_HEIGHT_SCRIPT).await?;
        height_from_value(&value)
    }

    /// Suspends the caller for `duration`.
    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn height_from_value(value: &serde_json::Value) -> Result<u64, DriverError> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|h| h.is_finite() && *h >= 0.0).map(|h| h.round() as u64))
        .ok_or_else(|| DriverError::Evaluation(format!("document height is not a number: {value}")))
}
