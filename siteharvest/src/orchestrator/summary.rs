//! Run summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::traversal::StopReason;

/// What happened at one start URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSummary {
    /// The start URL.
    pub url: String,
    /// Strategy applied.
    pub strategy: String,
    /// Scrolls performed or pages extracted.
    pub steps: u32,
    /// Why the traversal ended.
    pub stop: StopReason,
    /// Records extracted at this URL.
    pub records: usize,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier of the run, also carried by its events and log spans.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last start URL finished.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Number of start URLs processed.
    pub urls_visited: usize,
    /// Records in the final table.
    pub records: usize,
    /// Per start URL breakdown, in visiting order.
    pub per_url: Vec<UrlSummary>,
}

impl RunSummary {
    /// One-line human-readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "run {} harvested {} records from {} URLs in {:.0} ms",
            self.run_id, self.records, self.urls_visited, self.duration_ms
        )
    }
}
