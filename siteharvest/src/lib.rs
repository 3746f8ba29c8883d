//! # Siteharvest
//!
//! A configuration-driven engine for extracting tabular records from
//! listing-style web pages.
//!
//! A run is described by a [`RunConfig`](config::RunConfig):
//!
//! - **Start URLs**: entry points visited one after another
//! - **Traversal**: infinite scroll, click pagination or URL-templated
//!   pagination
//! - **Extraction schema**: an item selector plus a field-to-selector map
//! - **Columns**: the fixed column order of the output table
//!
//! The [`Harvester`](orchestrator::Harvester) drives a
//! [`PageDriver`](driver::PageDriver) through each start URL, collects the
//! records, projects them onto the columns and hands the table to a
//! [`RecordSink`](output::RecordSink).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use siteharvest::prelude::*;
//!
//! let config = RunConfig::from_path("harvest.json")?;
//! let driver = HtmlPageDriver::new(ReqwestFetcher::new(FetchConfig::default())?);
//! let harvester = Harvester::new(config, driver)?;
//!
//! let mut sink = sink_for_path(&harvester.config().output_file);
//! let summary = harvester.run(sink.as_mut()).await?;
//! println!("{}", summary.describe());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod driver;
pub mod errors;
pub mod events;
pub mod extract;
pub mod observability;
pub mod orchestrator;
pub mod output;
pub mod projection;
pub mod testing;
pub mod traversal;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ExtractionSchema, FieldSpec, HarvestFile, RunConfig, TraversalConfig, TraversalMode,
        UrlTemplate,
    };
    pub use crate::driver::{
        ElementHandle, FetchConfig, Fetcher, HtmlPageDriver, PageDriver, StaticFetcher, WaitUntil,
    };
    #[cfg(feature = "http")]
    pub use crate::driver::ReqwestFetcher;
    #[cfg(feature = "browser")]
    pub use crate::driver::{BrowserLaunch, BrowserPageDriver};
    pub use crate::errors::{ConfigurationError, DriverError, HarvestError, SinkError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::extract::{Record, RecordExtractor, ResultSet};
    pub use crate::orchestrator::{Harvester, RunSummary, UrlSummary};
    pub use crate::output::{sink_for_path, CsvSink, JsonLinesSink, MemorySink, RecordSink};
    pub use crate::projection::project;
    pub use crate::traversal::{StopReason, TraversalOutcome, TraversalStrategy};
}

pub use errors::{HarvestError, Result};
