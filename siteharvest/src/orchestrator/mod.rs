//! Run orchestration.
//!
//! The [`Harvester`] owns a validated [`RunConfig`] and a page driver. A run
//! visits every start URL in order, applies the configured traversal
//! strategy, accumulates the records, projects them onto the output columns
//! and hands the table to a [`RecordSink`]. Any error aborts the run and
//! nothing is written.

mod summary;


use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::driver::{PageDriver, WaitUntil};
use crate::errors::{ConfigurationError, HarvestError, Result};
use crate::events::{
    EventSink, NoOpEventSink, RUN_COMPLETED, RUN_STARTED, TRAVERSAL_COMPLETED, URL_COMPLETED,
    URL_STARTED,
};
use crate::extract::{Record, RecordExtractor, ResultSet};
use crate::observability::SpanTimer;
use crate::output::RecordSink;
use crate::projection::project;
use crate::traversal::{build_strategy, TraversalStrategy};

pub use summary::{RunSummary, UrlSummary};

/// Runs a configuration against a page driver.
pub struct Harvester<D: PageDriver> {
    config: RunConfig,
    driver: D,
    events: Arc<dyn EventSink>,
}

impl<D: PageDriver> std::fmt::Debug for Harvester<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: PageDriver> Harvester<D> {
    /// Creates a harvester. The configuration's schema is checked here, so
    /// an invalid run fails before any navigation.
    pub fn new(config: RunConfig, driver: D) -> Result<Self, ConfigurationError> {
        config.schema.validate()?;
        Ok(Self {
            config,
            driver,
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The page driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Visits every start URL and returns the projected table with a
    /// summary, without writing anything.
    #[instrument(skip_all, fields(strategy = self.config.traversal.strategy_name()))]
    pub async fn collect(&self) -> Result<(Vec<Record>, RunSummary)> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = SpanTimer::start("harvest");
        let strategy = build_strategy(&self.config.traversal);
        let extractor = RecordExtractor::new(self.config.schema.clone());

        info!(
            run_id = %run_id,
            urls = self.config.start_urls.len(),
            strategy = strategy.name(),
            "Harvest started"
        );
        self.events
            .emit(
                RUN_STARTED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "urls": self.config.start_urls,
                    "strategy": strategy.name(),
                })),
            )
            .await;

        let mut results = ResultSet::new();
        let mut per_url = Vec::with_capacity(self.config.start_urls.len());
        for url in &self.config.start_urls {
            let url_summary = self
                .harvest_url(run_id, url, strategy.as_ref(), &extractor, &mut results)
                .await?;
            per_url.push(url_summary);
            self.driver
                .wait_for_timeout(self.config.inter_url_pause)
                .await;
        }

        let records = project(results.records(), &self.config.output_columns);
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed_ms(),
            urls_visited: per_url.len(),
            records: records.len(),
            per_url,
        };
        Ok((records, summary))
    }

    /// Performs the run and writes the projected table to `sink`.
    pub async fn run(&self, sink: &mut dyn RecordSink) -> Result<RunSummary> {
        let (records, summary) = self.collect().await?;
        sink.write(&self.config.output_columns, &records)?;

        info!(
            run_id = %summary.run_id,
            records = summary.records,
            urls = summary.urls_visited,
            duration_ms = summary.duration_ms,
            "Harvest completed"
        );
        self.events
            .emit(
                RUN_COMPLETED,
                Some(serde_json::json!({
                    "run_id": summary.run_id,
                    "records": summary.records,
                    "duration_ms": summary.duration_ms,
                })),
            )
            .await;
        Ok(summary)
    }

    #[instrument(skip(self, strategy, extractor, results), fields(strategy = strategy.name()))]
    async fn harvest_url(
        &self,
        run_id: Uuid,
        url: &str,
        strategy: &dyn TraversalStrategy,
        extractor: &RecordExtractor,
        results: &mut ResultSet,
    ) -> Result<UrlSummary> {
        info!(url, "Opening start URL");
        self.events
            .emit(URL_STARTED, Some(serde_json::json!({"run_id": run_id, "url": url})))
            .await;

        self.driver
            .goto(url, WaitUntil::NetworkIdle)
            .await
            .map_err(|err| HarvestError::navigation(url, err))?;

        let outcome = strategy.traverse(&self.driver, extractor).await?;
        let url_summary = UrlSummary {
            url: url.to_string(),
            strategy: strategy.name().to_string(),
            steps: outcome.steps,
            stop: outcome.stop,
            records: outcome.records.len(),
        };
        self.events
            .emit(
                TRAVERSAL_COMPLETED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "url": url,
                    "strategy": url_summary.strategy,
                    "steps": url_summary.steps,
                    "stop": url_summary.stop,
                    "records": url_summary.records,
                })),
            )
            .await;

        results.extend(outcome.records);
        info!(
            url,
            records = url_summary.records,
            stop = %url_summary.stop,
            total = results.len(),
            "Start URL done"
        );
        self.events
            .emit(
                URL_COMPLETED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "url": url,
                    "total_records": results.len(),
                })),
            )
            .await;
        Ok(url_summary)
    }
}
