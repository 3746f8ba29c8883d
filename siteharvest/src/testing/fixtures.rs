//! Test fixtures: directory-style HTML pages and matching schemas.

use crate::config::{ExtractionSchema, FieldSpec, RunConfig, TraversalConfig};

/// A company card rendered the way listing pages present one.
#[derive(Debug, Clone, Default)]
pub struct CompanyCard {
    /// Company name, rendered in `h1`.
    pub name: String,
    /// E-mail address, rendered as a `mailto:` link.
    pub email: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Website URL.
    pub website: Option<String>,
}

impl CompanyCard {
    /// Creates a card with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the e-mail address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the street address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the website.
    #[must_use]
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Renders the card as `div.card` markup.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = format!("<div class=\"card\"><h1>{}</h1>", self.name);
        if let Some(address) = &self.address {
            html.push_str(&format!("<p class=\"addr\">{address}</p>"));
        }
        if let Some(email) = &self.email {
            html.push_str(&format!("<a class=\"mail\" href=\"mailto:{email}\">e-mail</a>"));
        }
        if let Some(website) = &self.website {
            html.push_str(&format!("<a class=\"web\" href=\"{website}\">site</a>"));
        }
        html.push_str("</div>");
        html
    }
}

/// Renders a listing page with the given cards and, optionally, a
/// `a.next` control pointing at `next_href`.
#[must_use]
pub fn listing_page(cards: &[CompanyCard], next_href: Option<&str>) -> String {
    let body: String = cards.iter().map(CompanyCard::to_html).collect();
    let next = next_href
        .map(|href| format!("<a class=\"next\" href=\"{href}\">Next</a>"))
        .unwrap_or_default();
    format!("<html><body><main>{body}</main>{next}</body></html>")
}

/// Schema matching [`CompanyCard`] markup.
#[must_use]
pub fn company_schema() -> ExtractionSchema {
    ExtractionSchema::new("div.card")
        .with_field("company_name", "h1")
        .with_field("address", FieldSpec::structured_text(".addr"))
        .with_field("email", FieldSpec::attribute("a.mail", "href"))
        .with_field("website", FieldSpec::attribute("a.web", "href"))
}

/// Run configuration over `urls` using [`company_schema`] and `traversal`,
/// with no pause between URLs.
#[must_use]
pub fn company_run(urls: &[&str], traversal: TraversalConfig) -> RunConfig {
    let config = RunConfig::new(company_schema()).expect("company schema is valid");
    urls.iter()
        .fold(config, |config, url| config.with_start_url(*url))
        .with_traversal(traversal)
        .with_inter_url_pause(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_markup() {
        let html = CompanyCard::new("Acme Corp")
            .with_email("info@acme.com")
            .to_html();
        assert!(html.contains("<h1>Acme Corp</h1>"));
        assert!(html.contains("href=\"mailto:info@acme.com\""));
        assert!(!html.contains("class=\"web\""));
    }

    #[test]
    fn test_listing_page_next_control() {
        let cards = [CompanyCard::new("A")];
        assert!(listing_page(&cards, Some("/p2")).contains("class=\"next\" href=\"/p2\""));
        assert!(!listing_page(&cards, None).contains("class=\"next\""));
    }

    #[test]
    fn test_company_schema_fields() {
        let schema = company_schema();
        assert_eq!(schema.item_selector, "div.card");
        assert_eq!(schema.fields.len(), 4);
    }
}
