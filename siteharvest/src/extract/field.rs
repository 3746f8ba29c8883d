//! Field extraction: one field spec against one item element.

use crate::config::FieldSpec;
use crate::driver::{ElementHandle, PageDriver};
use crate::errors::Result;

/// Prefix stripped from `href` values of e-mail links.
pub const MAILTO_PREFIX: &str = "mailto:";

/// Attribute whose values get [`MAILTO_PREFIX`] stripped.
pub const HREF_ATTRIBUTE: &str = "href";

/// Collapses whitespace runs to single spaces and trims; blank becomes `None`.
#[must_use]
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    let cleaned = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Removes a leading `mailto:` from `href` values. Other attributes and
/// other values pass through unchanged.
#[must_use]
pub fn strip_mailto<'a>(attribute: &str, value: &'a str) -> &'a str {
    if attribute == HREF_ATTRIBUTE {
        value.strip_prefix(MAILTO_PREFIX).unwrap_or(value)
    } else {
        value
    }
}

/// Reads the value `spec` describes from the descendants of `scope`.
///
/// A missing selector, a selector matching nothing and an absent attribute
/// all yield `Ok(None)`. Only driver failures are errors.
pub async fn extract_field(
    driver: &dyn PageDriver,
    scope: ElementHandle,
    spec: &FieldSpec,
) -> Result<Option<String>> {
    let Some(selector) = spec.selector() else {
        return Ok(None);
    };
    let Some(target) = driver.query_selector(Some(scope), selector).await? else {
        return Ok(None);
    };

    match spec.attribute_name() {
        Some(attribute) => {
            let raw = driver.get_attribute(target, attribute).await?;
            Ok(normalize_text(raw.as_deref().map(|v| strip_mailto(attribute, v))))
        }
        None => {
            let text = driver.inner_text(target).await?;
            Ok(normalize_text(Some(text.as_str())))
        }
    }
}
