//! Run configuration.
//!
//! This module provides:
//! - The on-disk configuration document (`HarvestFile`) with its defaults
//! - The validated `RunConfig` the orchestrator consumes
//! - The closed `TraversalConfig` strategy union
//! - The extraction schema and field specs

mod run;
mod schema;
mod traversal;

pub use run::{
    ExtractionSection, HarvestFile, PaginationSection, RunConfig, ScrollSection, DEFAULT_COLUMNS,
};
pub use schema::{ExtractionSchema, FieldSpec};
pub use traversal::{
    ClickPaginationSettings, ScrollSettings, TraversalConfig, TraversalMode,
    UrlPaginationSettings, UrlTemplate,
};
