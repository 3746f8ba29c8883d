//! Infinite-scroll traversal.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{StopReason, TraversalOutcome, TraversalStrategy};
use crate::config::ScrollSettings;
use crate::driver::PageDriver;
use crate::errors::Result;
use crate::extract::RecordExtractor;

/// Scrolls to the bottom until the document height stops changing, then
/// extracts the final page state once.
#[derive(Debug, Clone)]
pub struct InfiniteScroll {
    settings: ScrollSettings,
}

impl InfiniteScroll {
    /// Creates the strategy.
    #[must_use]
    pub fn new(settings: ScrollSettings) -> Self {
        Self { settings }
    }

    /// The scroll parameters.
    #[must_use]
    pub fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    /// Runs the scroll loop and returns the number of scrolls performed and
    /// why it stopped.
    async fn scroll_until_stable(&self, driver: &dyn PageDriver) -> Result<(u32, StopReason)> {
        let mut previous_height = 0_u64;
        let mut unchanged = 0_u32;

        for scroll in 1..=self.settings.max_scrolls {
            driver.scroll_to_bottom().await?;
            driver.wait_for_timeout(self.settings.pause).await;
            let height = driver.document_height().await?;

            if height == previous_height {
                unchanged += 1;
            } else {
                unchanged = 0;
            }
            previous_height = height;
            debug!(scroll, height, unchanged, "Scrolled");

            if unchanged >= self.settings.stop_after_unchanged {
                return Ok((scroll, StopReason::Stable));
            }
        }

        Ok((self.settings.max_scrolls, StopReason::MaxScrolls))
    }
}

#[async_trait]
impl TraversalStrategy for InfiniteScroll {
    fn name(&self) -> &'static str {
        "infinite_scroll"
    }

    #[instrument(skip_all, fields(max_scrolls = self.settings.max_scrolls))]
    async fn traverse(
        &self,
        driver: &dyn PageDriver,
        extractor: &RecordExtractor,
    ) -> Result<TraversalOutcome> {
        let (scrolls, stop) = self.scroll_until_stable(driver).await?;
        let records = extractor.extract(driver).await?;
        debug!(scrolls, stop = %stop, records = records.len(), "Infinite scroll finished");
        Ok(TraversalOutcome::new(records, scrolls, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{company_schema, listing_page, CompanyCard, DriverCall, ScriptedDriver};
    use std::time::Duration;

    fn strategy(max_scrolls: u32, stop_after_unchanged: u32) -> InfiniteScroll {
        InfiniteScroll::new(ScrollSettings {
            max_scrolls,
            pause: Duration::from_millis(1200),
            stop_after_unchanged,
        })
    }

    fn loaded_driver(heights: &[u64]) -> ScriptedDriver {
        let driver = ScriptedDriver::new().with_heights(heights.iter().copied());
        driver.load_html(
            "https://site.test/",
            listing_page(&[CompanyCard::new("A"), CompanyCard::new("B")], None),
        );
        driver
    }

    #[tokio::test]
    async fn test_stops_once_height_is_stable() {
        // Baseline is 0, so the first 200 counts as growth and three more
        // equal reads are needed.
        let driver = loaded_driver(&[100, 200, 200, 200, 200, 300]);
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy(50, 3).traverse(&driver, &extractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::Stable);
        assert_eq!(outcome.steps, 5);
        assert_eq!(driver.measured_heights(), vec![100, 200, 200, 200, 200]);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn test_stops_at_max_scrolls() {
        let driver = loaded_driver(&[100, 200, 300, 400, 500]);
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy(3, 3).traverse(&driver, &extractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::MaxScrolls);
        assert_eq!(outcome.steps, 3);
        assert_eq!(driver.measured_heights(), vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn test_extracts_exactly_once_after_scrolling() {
        let driver = loaded_driver(&[100, 100, 100]);
        let extractor = RecordExtractor::new(company_schema());

        strategy(10, 2).traverse(&driver, &extractor).await.unwrap();

        assert_eq!(driver.query_all_count("div.card"), 1);
        let calls = driver.calls();
        assert_eq!(calls.last(), Some(&DriverCall::QueryAll("div.card".to_string())));
    }

    #[tokio::test]
    async fn test_each_scroll_waits_before_measuring() {
        let driver = loaded_driver(&[100, 100]);
        let extractor = RecordExtractor::new(company_schema());

        strategy(10, 1).traverse(&driver, &extractor).await.unwrap();

        let pause = Duration::from_millis(1200);
        assert_eq!(
            driver.calls()[..6],
            [
                DriverCall::ScrollToBottom,
                DriverCall::Wait(pause),
                DriverCall::MeasureHeight(100),
                DriverCall::ScrollToBottom,
                DriverCall::Wait(pause),
                DriverCall::MeasureHeight(100),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_scroll_budget_still_extracts() {
        let driver = loaded_driver(&[]);
        let extractor = RecordExtractor::new(company_schema());

        let outcome = strategy(0, 3).traverse(&driver, &extractor).await.unwrap();

        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.stop, StopReason::MaxScrolls);
        assert!(driver.measured_heights().is_empty());
        assert_eq!(outcome.records.len(), 2);
    }
}
