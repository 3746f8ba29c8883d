//! Mapping page elements to records.
//!
//! This module provides:
//! - Field extraction with whitespace normalization and `mailto:` stripping
//! - The `Record` type and the run-wide `ResultSet`
//! - The `RecordExtractor` applied to each page state

mod field;
mod record;

pub use field::{extract_field, normalize_text, strip_mailto, HREF_ATTRIBUTE, MAILTO_PREFIX};
pub use record::{Record, RecordExtractor, ResultSet};
