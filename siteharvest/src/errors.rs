//! Error types for the siteharvest engine.
//!
//! Element misses and absent attributes are not errors anywhere in this crate:
//! they resolve to `None` values or to a traversal stop. Everything in this
//! module is fatal for the run that produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for harvest runs.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The run configuration was rejected before any navigation happened.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The page driver could not reach a target URL.
    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        /// The URL that could not be loaded.
        url: String,
        /// The underlying driver failure.
        #[source]
        source: DriverError,
    },

    /// Any other page driver failure.
    #[error("Driver error: {0}")]
    Driver(DriverError),

    /// Writing the tabular output failed.
    #[error("{0}")]
    Sink(#[from] SinkError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HarvestError {
    /// Wraps a driver failure that happened while loading `url`.
    #[must_use]
    pub fn navigation(url: impl Into<String>, source: DriverError) -> Self {
        Self::Navigation {
            url: url.into(),
            source,
        }
    }

    /// Whether this error was raised by configuration validation.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether this error came from a failed navigation.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigation { .. })
    }
}

impl From<DriverError> for HarvestError {
    fn from(err: DriverError) -> Self {
        if let DriverError::Navigation { url, .. } = &err {
            let url = url.clone();
            return Self::navigation(url, err);
        }
        Self::Driver(err)
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a run configuration is invalid.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Invalid configuration at '{field}': {message}")]
pub struct ConfigurationError {
    /// Dotted path of the offending field (e.g. `extraction.item_selector`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Error for a `mode` value that names no known traversal strategy.
    #[must_use]
    pub fn unknown_mode(mode: &str) -> Self {
        Self::new("mode", format!("Unknown mode: {mode}"))
            .with_fix_hint("Use \"infinite_scroll\" or \"pagination\".")
    }

    /// Error for a required selector that is missing or blank.
    #[must_use]
    pub fn missing_selector(field: impl Into<String>) -> Self {
        Self::new(field, "selector must not be empty")
    }
}

/// Failures reported by a page driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The target could not be loaded.
    #[error("cannot load {url}: {message}")]
    Navigation {
        /// The requested URL.
        url: String,
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A CSS selector could not be parsed.
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// An element handle outlived the document it was taken from.
    #[error("element handle refers to a document that is no longer loaded")]
    StaleElement,

    /// The driver does not support the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A script evaluation failed or returned an unexpected value.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The browser connection failed or answered with a protocol error.
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Failures while persisting the final table.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output could not be written.
    #[error("Sink IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("Sink serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T, E = HarvestError> = std::result::Result<T, E>;
