//! URL-templated pagination.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{StopReason, TraversalOutcome, TraversalStrategy};
use crate::config::UrlPaginationSettings;
use crate::driver::{PageDriver, WaitUntil};
use crate::errors::{HarvestError, Result};
use crate::extract::RecordExtractor;

/// Visits `max_pages` consecutive page URLs built from a template.
#[derive(Debug, Clone)]
pub struct UrlPagination {
    settings: UrlPaginationSettings,
}

impl UrlPagination {
    /// Creates the strategy.
    #[must_use]
    pub fn new(settings: UrlPaginationSettings) -> Self {
        Self { settings }
    }

    /// The pagination parameters.
    #[must_use]
    pub fn settings(&self) -> &UrlPaginationSettings {
        &self.settings
    }

    /// Page URLs in visiting order. Ends early rather than wrap past
    /// `u32::MAX`.
    pub fn page_urls(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.settings.max_pages)
            .map_while(|offset| self.settings.start_page.checked_add(offset))
            .map(|page| self.settings.url_template.render(page))
    }
}

#[async_trait]
impl TraversalStrategy for UrlPagination {
    fn name(&self) -> &'static str {
        "url_pagination"
    }

    #[instrument(skip_all, fields(template = %self.settings.url_template))]
    async fn traverse(
        &self,
        driver: &dyn PageDriver,
        extractor: &RecordExtractor,
    ) -> Result<TraversalOutcome> {
        if self.settings.url_template.is_empty() {
            warn!("No URL template configured, skipping pagination");
            return Ok(TraversalOutcome::empty(StopReason::TemplateMissing));
        }

        let mut records = Vec::new();
        let mut pages = 0;
        for url in self.page_urls() {
            driver
                .goto(&url, WaitUntil::NetworkIdle)
                .await
                .map_err(|err| HarvestError::navigation(url.as_str(), err))?;
            let batch = extractor.extract(driver).await?;
            debug!(url = %url, records = batch.len(), "Extracted page");
            records.extend(batch);
            pages += 1;
            driver.wait_for_timeout(self.settings.pause).await;
        }

        Ok(TraversalOutcome::new(records, pages, StopReason::MaxPages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UrlTemplate;
    use crate::testing::{
        assert_column_values, company_schema, listing_page, CompanyCard, ScriptedDriver,
    };
    use std::time::Duration;

    fn strategy(template: &str, start_page: u32, max_pages: u32) -> UrlPagination {
        UrlPagination::new(UrlPaginationSettings {
            url_template: UrlTemplate::new(template),
            start_page,
            max_pages,
            pause: Duration::from_millis(1500),
        })
    }

    fn page(name: &str) -> String {
        listing_page(&[CompanyCard::new(name)], None)
    }

    #[tokio::test]
    async fn test_visits_every_page_in_order() {
        let driver = ScriptedDriver::new()
            .with_page("https://site.test/list?page=1", page("A"))
            .with_page("https://site.test/list?page=2", page("B"))
            .with_page("https://site.test/list?page=3", page("C"));
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy("https://site.test/list?page={page}", 1, 3)
            .traverse(&driver, &extractor)
            .await
            .unwrap();

        assert_eq!(
            driver.visited_urls(),
            vec![
                "https://site.test/list?page=1",
                "https://site.test/list?page=2",
                "https://site.test/list?page=3",
            ]
        );
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.stop, StopReason::MaxPages);
        assert_eq!(driver.waits().len(), 3);
        assert_column_values(&outcome.records, "company_name", &[Some("A"), Some("B"), Some("C")]);
    }

    #[tokio::test]
    async fn test_empty_pages_do_not_stop_early() {
        let driver = ScriptedDriver::new().with_fallback_page("<p>nothing here</p>");
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy("https://site.test/{page}", 5, 4)
            .traverse(&driver, &extractor)
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(
            driver.visited_urls(),
            vec![
                "https://site.test/5",
                "https://site.test/6",
                "https://site.test/7",
                "https://site.test/8",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_template_does_nothing() {
        let driver = ScriptedDriver::new().with_fallback_page(page("A"));
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy("", 1, 3).traverse(&driver, &extractor).await.unwrap();

        assert_eq!(outcome, TraversalOutcome::empty(StopReason::TemplateMissing));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_fatal() {
        let driver = ScriptedDriver::new()
            .with_fallback_page(page("A"))
            .with_failing_url("https://site.test/2");
        let extractor = RecordExtractor::new(company_schema());

        let err = strategy("https://site.test/{page}", 1, 3)
            .traverse(&driver, &extractor)
            .await
            .unwrap_err();

        match err {
            HarvestError::Navigation { url, .. } => assert_eq!(url, "https://site.test/2"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(driver.visited_urls().len(), 2);
    }

    #[test]
    fn test_page_numbers_stop_at_overflow() {
        let urls: Vec<_> = strategy("p{page}", u32::MAX - 1, 3).page_urls().collect();
        assert_eq!(urls, vec![format!("p{}", u32::MAX - 1), format!("p{}", u32::MAX)]);
    }
}
