//! Scripted page driver for testing traversal and orchestration.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::driver::{
    ElementHandle, HtmlPageDriver, PageDriver, StaticFetcher, WaitUntil, DOCUMENT_HEIGHT_SCRIPT,
    SCROLL_TO_BOTTOM_SCRIPT,
};
use crate::errors::DriverError;

/// A call observed by [`ScriptedDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// Navigation to a URL.
    Goto(String),
    /// Document-wide single-element query.
    Query(String),
    /// Document-wide query for all matches.
    QueryAll(String),
    /// Element activation.
    Click,
    /// Scroll to the bottom of the document.
    ScrollToBottom,
    /// Document height read, with the value returned.
    MeasureHeight(u64),
    /// Timed wait.
    Wait(Duration),
}

#[derive(Debug, Default)]
struct Script {
    pages: HashMap<String, String>,
    fallback_page: Option<String>,
    failing_urls: Vec<String>,
    click_pages: VecDeque<String>,
    heights: VecDeque<u64>,
    last_height: u64,
    calls: Vec<DriverCall>,
}

/// An in-memory [`PageDriver`] with scripted behaviour.
///
/// Element queries run against real HTML snapshots. Navigation loads the
/// page registered for a URL (or the fallback page), clicks load the next
/// scripted snapshot, document heights come from a scripted sequence whose
/// last value repeats, and waits return immediately. Every call is recorded.
#[derive(Debug)]
pub struct ScriptedDriver {
    dom: HtmlPageDriver<StaticFetcher>,
    script: Mutex<Script>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDriver {
    /// Creates a driver with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dom: HtmlPageDriver::new(StaticFetcher::new()),
            script: Mutex::new(Script::default()),
        }
    }

    /// Serves `html` when `url` is navigated to.
    #[must_use]
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.script.lock().pages.insert(url.into(), html.into());
        self
    }

    /// Serves `html` for any URL without a registered page.
    #[must_use]
    pub fn with_fallback_page(self, html: impl Into<String>) -> Self {
        self.script.lock().fallback_page = Some(html.into());
        self
    }

    /// Makes navigation to `url` fail.
    #[must_use]
    pub fn with_failing_url(self, url: impl Into<String>) -> Self {
        self.script.lock().failing_urls.push(url.into());
        self
    }

    /// Queues the document loaded by the next click.
    #[must_use]
    pub fn with_click_page(self, html: impl Into<String>) -> Self {
        self.script.lock().click_pages.push_back(html.into());
        self
    }

    /// Scripts the document heights returned by successive reads.
    #[must_use]
    pub fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.script.lock().heights.extend(heights);
        self
    }

    /// Loads `html` as the current document without recording a navigation.
    pub fn load_html(&self, url: impl Into<String>, html: impl Into<String>) {
        self.dom.load_html(url, html.into());
    }

    /// Every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DriverCall> {
        self.script.lock().calls.clone()
    }

    /// URLs navigated to, in order.
    #[must_use]
    pub fn visited_urls(&self) -> Vec<String> {
        self.filter_calls(|call| match call {
            DriverCall::Goto(url) => Some(url.clone()),
            _ => None,
        })
    }

    /// Durations waited, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.filter_calls(|call| match call {
            DriverCall::Wait(duration) => Some(*duration),
            _ => None,
        })
    }

    /// Heights returned by document height reads, in order.
    #[must_use]
    pub fn measured_heights(&self) -> Vec<u64> {
        self.filter_calls(|call| match call {
            DriverCall::MeasureHeight(height) => Some(*height),
            _ => None,
        })
    }

    /// Number of document-wide queries for all matches of `selector`.
    #[must_use]
    pub fn query_all_count(&self, selector: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, DriverCall::QueryAll(s) if s == selector))
            .count()
    }

    /// Number of clicks.
    #[must_use]
    pub fn click_count(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Click))
            .count()
    }

    fn filter_calls<T>(&self, f: impl Fn(&DriverCall) -> Option<T>) -> Vec<T> {
        self.script.lock().calls.iter().filter_map(f).collect()
    }

    fn record(&self, call: DriverCall) {
        self.script.lock().calls.push(call);
    }

    fn next_height(&self) -> u64 {
        let mut script = self.script.lock();
        if let Some(height) = script.heights.pop_front() {
            script.last_height = height;
        }
        let height = script.last_height;
        script.calls.push(DriverCall::MeasureHeight(height));
        height
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn goto(&self, url: &str, _wait_until: WaitUntil) -> Result<(), DriverError> {
        self.record(DriverCall::Goto(url.to_string()));
        let page = {
            let script = self.script.lock();
            if script.failing_urls.iter().any(|u| u == url) {
                None
            } else {
                script
                    .pages
                    .get(url)
                    .or(script.fallback_page.as_ref())
                    .cloned()
            }
        };
        match page {
            Some(html) => {
                self.dom.load_html(url, html);
                Ok(())
            }
            None => Err(DriverError::Navigation {
                url: url.to_string(),
                status: None,
                message: "scripted navigation failure".to_string(),
            }),
        }
    }

    fn current_url(&self) -> Option<String> {
        self.dom.current_url()
    }

    async fn query_selector(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        if scope.is_none() {
            self.record(DriverCall::Query(selector.to_string()));
        }
        self.dom.query_selector(scope, selector).await
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        if scope.is_none() {
            self.record(DriverCall::QueryAll(selector.to_string()));
        }
        self.dom.query_selector_all(scope, selector).await
    }

    async fn inner_text(&self, element: ElementHandle) -> Result<String, DriverError> {
        self.dom.inner_text(element).await
    }

    async fn get_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.dom.get_attribute(element, name).await
    }

    async fn click(&self, element: ElementHandle) -> Result<(), DriverError> {
        self.dom.inner_text(element).await?;
        self.record(DriverCall::Click);
        let next = self.script.lock().click_pages.pop_front();
        match next {
            Some(html) => {
                let url = self.dom.current_url().unwrap_or_default();
                self.dom.load_html(url, html);
                Ok(())
            }
            None => Err(DriverError::Unsupported(
                "no scripted page left for click".to_string(),
            )),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        match expression {
            SCROLL_TO_BOTTOM_SCRIPT => {
                self.record(DriverCall::ScrollToBottom);
                Ok(serde_json::Value::Null)
            }
            DOCUMENT_HEIGHT_SCRIPT => Ok(serde_json::json!(self.next_height())),
            other => Err(DriverError::Unsupported(other.to_string())),
        }
    }

    async fn wait_for_timeout(&self, duration: Duration) {
        self.record(DriverCall::Wait(duration));
    }
}
