//! Extraction schema: item boundaries and per-field selectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ConfigurationError;

/// How to read one field out of an item element.
///
/// A bare string is a selector whose visible text is extracted. The
/// structured form can read an attribute instead. A missing or blank
/// selector always yields no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Extract the visible text of the first match.
    Text(String),
    /// Extract text or an attribute of the first match.
    Structured {
        /// Selector relative to the item element.
        #[serde(default)]
        selector: Option<String>,
        /// Attribute to read instead of text.
        #[serde(default, alias = "attribute", skip_serializing_if = "Option::is_none")]
        attr: Option<String>,
    },
}

impl FieldSpec {
    /// A text field.
    #[must_use]
    pub fn text(selector: impl Into<String>) -> Self {
        Self::Text(selector.into())
    }

    /// An attribute field.
    #[must_use]
    pub fn attribute(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::Structured {
            selector: Some(selector.into()),
            attr: Some(attr.into()),
        }
    }

    /// A structured field that reads text.
    #[must_use]
    pub fn structured_text(selector: impl Into<String>) -> Self {
        Self::Structured {
            selector: Some(selector.into()),
            attr: None,
        }
    }

    /// Selector to query. Missing and blank selectors are `None`.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        let selector = match self {
            Self::Text(selector) => Some(selector.as_str()),
            Self::Structured { selector, .. } => selector.as_deref(),
        };
        selector.filter(|s| !s.trim().is_empty())
    }

    /// Attribute to read, if any. Blank names count as absent.
    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Structured { attr, .. } => attr.as_deref().filter(|a| !a.is_empty()),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(selector: &str) -> Self {
        Self::text(selector)
    }
}

/// Item selector plus the named fields read from every item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Selector matching one element per record.
    pub item_selector: String,
    /// Field name to spec; iteration order is the key order.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

impl ExtractionSchema {
    /// Creates a schema with no fields.
    #[must_use]
    pub fn new(item_selector: impl Into<String>) -> Self {
        Self {
            item_selector: item_selector.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        self.fields.insert(name.into(), spec.into());
        self
    }

    /// Rejects a schema without a usable item selector.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.item_selector.trim().is_empty() {
            return Err(ConfigurationError::missing_selector("extraction.item_selector")
                .with_fix_hint("Set extraction.item_selector to a selector matching one element per item."));
        }
        Ok(())
    }
}
