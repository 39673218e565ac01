//! Release detection, retention and announcement.
//!
//! The batch jobs here are what the `herald` binary schedules:
//!
//! - [`jobs::poll_index`]: package-index feed -> packages and releases
//! - [`jobs::watch_code_hosting`]: tracked repositories -> metadata and releases
//! - [`RetentionPolicy::prune`]: three independent delete passes
//! - [`Notifier::run_cycle`]: announce the oldest eligible release per category
//!
//! Every job is idempotent and sequential; all persistence goes through
//! [`herald_store::ReleaseRepository`].
pub mod detector;
pub mod jobs;
pub mod notifier;
pub mod retention;

pub use detector::ReleaseDetector;
pub use jobs::{poll_index, watch_code_hosting, PollReport, WatchReport, DEFAULT_RELEASE_PATTERN};
pub use notifier::{
    render_announcement, CycleReport, FailureSink, Notifier, TracingFailureSink,
};
pub use retention::{PruneReport, RetentionPolicy};
