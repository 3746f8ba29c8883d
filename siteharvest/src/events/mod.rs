//! Run lifecycle events.
//!
//! The orchestrator reports progress through an [`EventSink`] it is handed
//! at construction. Event names are dotted, `subject.action`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run began.
pub const RUN_STARTED: &str = "run.started";
/// Navigation to a start URL began.
pub const URL_STARTED: &str = "url.started";
/// A traversal strategy finished at a start URL.
pub const TRAVERSAL_COMPLETED: &str = "traversal.completed";
/// A start URL was fully processed.
pub const URL_COMPLETED: &str = "url.completed";
/// All start URLs were processed and the table was written.
pub const RUN_COMPLETED: &str = "run.completed";
