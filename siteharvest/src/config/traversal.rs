//! Traversal configuration: which strategy discovers a site's items.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use crate::errors::ConfigurationError;

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|(?P<page>\{page(?::0?(?P<width>\d+)d?)?\})")
        .expect("template token pattern is valid")
});

/// The `mode` selector of a run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Scroll until the document stops growing, then extract once.
    #[default]
    InfiniteScroll,
    /// Click- or URL-driven pagination, extracting every page.
    Pagination,
}

impl TraversalMode {
    /// The configuration spelling of this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfiniteScroll => "infinite_scroll",
            Self::Pagination => "pagination",
        }
    }
}

impl FromStr for TraversalMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infinite_scroll" => Ok(Self::InfiniteScroll),
            "pagination" => Ok(Self::Pagination),
            other => Err(ConfigurationError::unknown_mode(other)),
        }
    }
}

impl fmt::Display for TraversalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page URL containing a `{page}` placeholder.
///
/// `{page:03}` and `{page:03d}` render the number zero-padded to the given
/// width. `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    /// Wraps a template string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the template is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether the template contains at least one page placeholder.
    #[must_use]
    pub fn has_placeholder(&self) -> bool {
        TEMPLATE_TOKEN
            .captures_iter(&self.0)
            .any(|caps| caps.name("page").is_some())
    }

    /// Substitutes `page` for every placeholder.
    #[must_use]
    pub fn render(&self, page: u32) -> String {
        TEMPLATE_TOKEN
            .replace_all(&self.0, |caps: &Captures<'_>| match &caps[0] {
                "{{" => "{".to_string(),
                "}}" => "}".to_string(),
                _ => {
                    let width = caps
                        .name("width")
                        .and_then(|w| w.as_str().parse::<usize>().ok())
                        .unwrap_or(0);
                    format!("{page:0width$}")
                }
            })
            .into_owned()
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of the infinite-scroll strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollSettings {
    /// Upper bound on scroll iterations.
    pub max_scrolls: u32,
    /// Wait after each scroll before measuring.
    pub pause: Duration,
    /// Consecutive equal heights that end the loop.
    pub stop_after_unchanged: u32,
}

/// Parameters of click-based pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickPaginationSettings {
    /// Selector of the "next" control; `None` means single-page mode.
    pub next_selector: Option<String>,
    /// Upper bound on extracted pages.
    pub max_pages: u32,
    /// Wait after activating the next control.
    pub pause: Duration,
}

/// Parameters of URL-templated pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPaginationSettings {
    /// Template the page number is substituted into.
    pub url_template: UrlTemplate,
    /// First page number.
    pub start_page: u32,
    /// Number of pages visited.
    pub max_pages: u32,
    /// Wait after extracting each page.
    pub pause: Duration,
}

/// The closed set of traversal strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalConfig {
    /// Scroll-based lazy loading.
    InfiniteScroll(ScrollSettings),
    /// "Next" control pagination.
    ClickPagination(ClickPaginationSettings),
    /// Page-number URL pagination.
    UrlPagination(UrlPaginationSettings),
}

impl TraversalConfig {
    /// The configuration mode this variant belongs to.
    #[must_use]
    pub fn mode(&self) -> TraversalMode {
        match self {
            Self::InfiniteScroll(_) => TraversalMode::InfiniteScroll,
            Self::ClickPagination(_) | Self::UrlPagination(_) => TraversalMode::Pagination,
        }
    }

    /// Short strategy name used in logs and summaries.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Self::InfiniteScroll(_) => "infinite_scroll",
            Self::ClickPagination(_) => "click_pagination",
            Self::UrlPagination(_) => "url_pagination",
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self::InfiniteScroll(ScrollSettings {
            max_scrolls: super::run::default_max_scrolls(),
            pause: Duration::from_millis(super::run::default_scroll_pause_ms()),
            stop_after_unchanged: super::run::default_stop_after_unchanged(),
        })
    }
}
