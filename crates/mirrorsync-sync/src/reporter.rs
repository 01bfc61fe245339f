//! Reporter that turns pass events into `tracing` events

use mirrorsync_types::{Error, LogEntry, PassReport, SyncFailure, SyncReporter};
use std::path::Path;
use tracing::{error, info, warn};

/// Emits every pass event through `tracing`
///
/// Useful when there is no terminal to print to: the diagnostics log then
/// carries the same information the console would have shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn pass_started(&self, source: &Path, replica: &Path) {
        info!(source = %source.display(), replica = %replica.display(), "pass started");
    }

    fn operation_applied(&self, entry: &LogEntry) {
        info!(operation = entry.kind.as_str(), path = %entry.path, "{}", entry.describe());
    }

    fn failure(&self, failure: &SyncFailure) {
        warn!(stage = %failure.stage, "{}", failure.error);
    }

    fn pass_completed(&self, report: &PassReport) {
        info!(
            created = report.stats.files_created,
            modified = report.stats.files_modified,
            deleted = report.stats.files_deleted,
            unchanged = report.stats.files_unchanged,
            failures = report.failures.len(),
            "pass completed"
        );
    }

    fn pass_aborted(&self, error: &Error) {
        error!(kind = ?error.kind(), "pass aborted: {}", error);
    }
}
