//! Click-based pagination.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{StopReason, TraversalOutcome, TraversalStrategy};
use crate::config::ClickPaginationSettings;
use crate::driver::PageDriver;
use crate::errors::Result;
use crate::extract::RecordExtractor;

/// Extracts the current page, activates the "next" control, and repeats.
#[derive(Debug, Clone)]
pub struct ClickPagination {
    settings: ClickPaginationSettings,
}

impl ClickPagination {
    /// Creates the strategy.
    #[must_use]
    pub fn new(settings: ClickPaginationSettings) -> Self {
        Self { settings }
    }

    /// The pagination parameters.
    #[must_use]
    pub fn settings(&self) -> &ClickPaginationSettings {
        &self.settings
    }
}

#[async_trait]
impl TraversalStrategy for ClickPagination {
    fn name(&self) -> &'static str {
        "click_pagination"
    }

    #[instrument(skip_all, fields(max_pages = self.settings.max_pages))]
    async fn traverse(
        &self,
        driver: &dyn PageDriver,
        extractor: &RecordExtractor,
    ) -> Result<TraversalOutcome> {
        let mut records = Vec::new();

        for page in 1..=self.settings.max_pages {
            let batch = extractor.extract(driver).await?;
            debug!(page, records = batch.len(), "Extracted page");
            records.extend(batch);

            let Some(next_selector) = self.settings.next_selector.as_deref() else {
                return Ok(TraversalOutcome::new(records, page, StopReason::SinglePage));
            };
            let Some(next) = driver.query_selector(None, next_selector).await? else {
                debug!(page, next_selector, "Next control not found");
                return Ok(TraversalOutcome::new(records, page, StopReason::NoNextControl));
            };

            driver.click(next).await?;
            driver.wait_for_timeout(self.settings.pause).await;
        }

        Ok(TraversalOutcome::new(
            records,
            self.settings.max_pages,
            StopReason::MaxPages,
        ))
    }
}
