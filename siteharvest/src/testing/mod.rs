//! Testing utilities for harvest runs.
//!
//! This module provides:
//! - A scripted page driver with call recording
//! - HTML fixtures and matching schemas
//! - Assertions over records

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_column_values, assert_columns, column_values};
pub use fixtures::{company_run, company_schema, listing_page, CompanyCard};
pub use mocks::{DriverCall, ScriptedDriver};
