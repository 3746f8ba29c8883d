//! Run configuration: the file format and its validated, typed form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::schema::{ExtractionSchema, FieldSpec};
use super::traversal::{
    ClickPaginationSettings, ScrollSettings, TraversalConfig, TraversalMode, UrlPaginationSettings,
    UrlTemplate,
};
use crate::errors::{ConfigurationError, HarvestError};

/// Columns written when a configuration names none.
pub const DEFAULT_COLUMNS: [&str; 7] = [
    "company_name",
    "address",
    "email",
    "website",
    "phone",
    "country",
    "field",
];

fn default_mode() -> String {
    TraversalMode::InfiniteScroll.as_str().to_string()
}

pub(crate) fn default_max_scrolls() -> u32 {
    50
}

pub(crate) fn default_scroll_pause_ms() -> u64 {
    1200
}

pub(crate) fn default_stop_after_unchanged() -> u32 {
    3
}

fn default_start_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    50
}

fn default_pagination_pause_ms() -> u64 {
    1500
}

fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(ToString::to_string).collect()
}

fn default_output_file() -> PathBuf {
    PathBuf::from("output.csv")
}

fn default_between_urls_pause() -> f64 {
    1.0
}

/// `scroll` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrollSection {
    /// Upper bound on scroll iterations.
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,
    /// Wait after each scroll, in milliseconds.
    #[serde(default = "default_scroll_pause_ms")]
    pub pause_ms: u64,
    /// Consecutive equal heights that end scrolling.
    #[serde(default = "default_stop_after_unchanged")]
    pub stop_after_unchanged: u32,
}

impl Default for ScrollSection {
    fn default() -> Self {
        Self {
            max_scrolls: default_max_scrolls(),
            pause_ms: default_scroll_pause_ms(),
            stop_after_unchanged: default_stop_after_unchanged(),
        }
    }
}

/// `pagination` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationSection {
    /// Selector of the "next" control for click pagination.
    #[serde(default)]
    pub next_button_selector: Option<String>,
    /// Page URL template; when set, URL pagination is used.
    #[serde(default)]
    pub url_template: Option<String>,
    /// First page number for URL pagination.
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    /// Upper bound on pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Wait between pages, in milliseconds.
    #[serde(default = "default_pagination_pause_ms")]
    pub pause_ms: u64,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            next_button_selector: None,
            url_template: None,
            start_page: default_start_page(),
            max_pages: default_max_pages(),
            pause_ms: default_pagination_pause_ms(),
        }
    }
}

/// `extraction` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExtractionSection {
    /// Selector matching one element per item.
    #[serde(default)]
    pub item_selector: Option<String>,
    /// Field specs by name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// A configuration document as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestFile {
    /// Entry points visited in order.
    #[serde(default)]
    pub start_urls: Vec<String>,
    /// `infinite_scroll` or `pagination`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Infinite-scroll parameters.
    #[serde(default)]
    pub scroll: ScrollSection,
    /// Pagination parameters.
    #[serde(default)]
    pub pagination: PaginationSection,
    /// Item and field selectors.
    #[serde(default)]
    pub extraction: ExtractionSection,
    /// Output column order.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    /// Where the table is written.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    /// Request a visible browser window.
    #[serde(default)]
    pub headful: bool,
    /// Wait between start URLs, in seconds.
    #[serde(default = "default_between_urls_pause")]
    pub between_urls_pause_s: f64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl HarvestFile {
    /// Parses a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(source).map_err(|err| {
            ConfigurationError::new("<document>", format!("malformed configuration: {err}"))
        })
    }

    /// Validates the document and resolves the traversal strategy.
    pub fn into_run_config(self) -> Result<RunConfig, ConfigurationError> {
        let mode: TraversalMode = self.mode.parse()?;

        let item_selector = non_blank(self.extraction.item_selector)
            .ok_or_else(|| ConfigurationError::missing_selector("extraction.item_selector"))?;
        let schema = ExtractionSchema {
            item_selector,
            fields: self.extraction.fields,
        };

        let traversal = match mode {
            TraversalMode::InfiniteScroll => TraversalConfig::InfiniteScroll(ScrollSettings {
                max_scrolls: self.scroll.max_scrolls,
                pause: Duration::from_millis(self.scroll.pause_ms),
                stop_after_unchanged: self.scroll.stop_after_unchanged,
            }),
            TraversalMode::Pagination => {
                let pagination = self.pagination;
                let pause = Duration::from_millis(pagination.pause_ms);
                match non_blank(pagination.url_template).map(UrlTemplate::new) {
                    Some(url_template) => {
                        if !url_template.has_placeholder() {
                            warn!(
                                template = %url_template,
                                "URL template has no {{page}} placeholder; every page visits the same URL"
                            );
                        }
                        TraversalConfig::UrlPagination(UrlPaginationSettings {
                            url_template,
                            start_page: pagination.start_page,
                            max_pages: pagination.max_pages,
                            pause,
                        })
                    }
                    None => TraversalConfig::ClickPagination(ClickPaginationSettings {
                        next_selector: non_blank(pagination.next_button_selector),
                        max_pages: pagination.max_pages,
                        pause,
                    }),
                }
            }
        };

        if !self.between_urls_pause_s.is_finite() || self.between_urls_pause_s < 0.0 {
            return Err(ConfigurationError::new(
                "between_urls_pause_s",
                "must be a non-negative number of seconds",
            ));
        }

        Ok(RunConfig {
            start_urls: self.start_urls,
            traversal,
            schema,
            output_columns: self.columns,
            inter_url_pause: Duration::from_secs_f64(self.between_urls_pause_s),
            output_file: self.output_file,
            headful: self.headful,
        })
    }
}

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Entry points visited in order.
    pub start_urls: Vec<String>,
    /// Strategy applied at every start URL.
    pub traversal: TraversalConfig,
    /// What to extract from each page state.
    pub schema: ExtractionSchema,
    /// Column order of the final table.
    pub output_columns: Vec<String>,
    /// Wait after each start URL.
    pub inter_url_pause: Duration,
    /// Where the table is written.
    pub output_file: PathBuf,
    /// Request a visible browser window.
    pub headful: bool,
}

impl RunConfig {
    /// Creates a configuration with default traversal, columns and pauses.
    pub fn new(schema: ExtractionSchema) -> Result<Self, ConfigurationError> {
        schema.validate()?;
        Ok(Self {
            start_urls: Vec::new(),
            traversal: TraversalConfig::default(),
            schema,
            output_columns: default_columns(),
            inter_url_pause: Duration::from_secs_f64(default_between_urls_pause()),
            output_file: default_output_file(),
            headful: false,
        })
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigurationError> {
        HarvestFile::from_json_str(source)?.into_run_config()
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| {
            ConfigurationError::new("<document>", format!("cannot read {}: {err}", path.display()))
        })?;
        Ok(Self::from_json_str(&source)?)
    }

    /// Adds a start URL.
    #[must_use]
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_urls.push(url.into());
        self
    }

    /// Sets the traversal strategy.
    #[must_use]
    pub fn with_traversal(mut self, traversal: TraversalConfig) -> Self {
        self.traversal = traversal;
        self
    }

    /// Sets the output columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the pause between start URLs.
    #[must_use]
    pub fn with_inter_url_pause(mut self, pause: Duration) -> Self {
        self.inter_url_pause = pause;
        self
    }

    /// Sets the output file.
    #[must_use]
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = path.into();
        self
    }

    /// The configured traversal mode.
    #[must_use]
    pub fn mode(&self) -> TraversalMode {
        self.traversal.mode()
    }
}
