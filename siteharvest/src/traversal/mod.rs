//! Traversal strategies.
//!
//! A strategy drives the page through its states and applies the record
//! extractor at the points it chooses:
//!
//! - [`InfiniteScroll`] scrolls until the document height stabilizes, then
//!   extracts once
//! - [`ClickPagination`] extracts, activates the "next" control, and repeats
//! - [`UrlPagination`] navigates to templated page URLs and extracts each
//!
//! Strategies never navigate to the start URL themselves; the orchestrator
//! does that before calling [`TraversalStrategy::traverse`].

mod click;
mod scroll;
mod url;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::config::TraversalConfig;
use crate::driver::PageDriver;
use crate::errors::Result;
use crate::extract::{Record, RecordExtractor};

pub use click::ClickPagination;
pub use scroll::InfiniteScroll;
pub use url::UrlPagination;

/// Why a traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The document height stayed unchanged for the configured number of
    /// consecutive scrolls.
    Stable,
    /// The scroll budget ran out.
    MaxScrolls,
    /// Click pagination without a next selector.
    SinglePage,
    /// The next control was not found on the current page.
    NoNextControl,
    /// The page budget ran out.
    MaxPages,
    /// URL pagination without a usable template.
    TemplateMissing,
}

impl StopReason {
    /// Snake-case name used in logs and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::MaxScrolls => "max_scrolls",
            Self::SinglePage => "single_page",
            Self::NoNextControl => "no_next_control",
            Self::MaxPages => "max_pages",
            Self::TemplateMissing => "template_missing",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records produced by one traversal, with how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalOutcome {
    /// Records in extraction order.
    pub records: Vec<Record>,
    /// Scrolls performed or pages extracted.
    pub steps: u32,
    /// Why the traversal ended.
    pub stop: StopReason,
}

impl TraversalOutcome {
    /// Creates an outcome.
    #[must_use]
    pub fn new(records: Vec<Record>, steps: u32, stop: StopReason) -> Self {
        Self {
            records,
            steps,
            stop,
        }
    }

    /// An outcome with no records and no steps.
    #[must_use]
    pub fn empty(stop: StopReason) -> Self {
        Self::new(Vec::new(), 0, stop)
    }
}

/// A way of moving through the states of a page.
#[async_trait]
pub trait TraversalStrategy: Send + Sync + fmt::Debug {
    /// Strategy name used in logs and summaries.
    fn name(&self) -> &'static str;

    /// Traverses from the currently loaded page and returns every record
    /// extracted along the way.
    async fn traverse(
        &self,
        driver: &dyn PageDriver,
        extractor: &RecordExtractor,
    ) -> Result<TraversalOutcome>;
}

/// Builds the strategy a traversal configuration selects.
#[must_use]
pub fn build_strategy(config: &TraversalConfig) -> Box<dyn TraversalStrategy> {
    match config {
        TraversalConfig::InfiniteScroll(settings) => Box::new(InfiniteScroll::new(settings.clone())),
        TraversalConfig::ClickPagination(settings) => {
            Box::new(ClickPagination::new(settings.clone()))
        }
        TraversalConfig::UrlPagination(settings) => Box::new(UrlPagination::new(settings.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClickPaginationSettings, UrlPaginationSettings, UrlTemplate};
    use std::time::Duration;

    #[test]
    fn test_build_strategy_matches_config() {
        assert_eq!(build_strategy(&TraversalConfig::default()).name(), "infinite_scroll");

        let click = TraversalConfig::ClickPagination(ClickPaginationSettings {
            next_selector: Some("a.next".to_string()),
            max_pages: 3,
            pause: Duration::ZERO,
        });
        assert_eq!(build_strategy(&click).name(), click.strategy_name());

        let url = TraversalConfig::UrlPagination(UrlPaginationSettings {
            url_template: UrlTemplate::new("https://example.com/?p={page}"),
            start_page: 1,
            max_pages: 2,
            pause: Duration::ZERO,
        });
        assert_eq!(build_strategy(&url).name(), "url_pagination");
    }

    #[test]
    fn test_stop_reason_names() {
        assert_eq!(StopReason::NoNextControl.to_string(), "no_next_control");
        assert_eq!(
            serde_json::to_value(StopReason::MaxScrolls).unwrap(),
            serde_json::json!("max_scrolls")
        );
    }
}
