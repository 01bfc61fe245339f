//! Core traits for MirrorSync
//!
//! The sync engine never prints. Everything an operator should see flows
//! through a [`SyncReporter`], so the CLI, tests, and embedding programs each
//! decide how to surface it.

use crate::{Error, LogEntry, PassReport, SyncFailure};
use std::path::Path;

/// Observer of a synchronization pass
pub trait SyncReporter: Send + Sync {
    /// A pass is starting
    fn pass_started(&self, _source: &Path, _replica: &Path) {}

    /// A file operation was applied and logged
    fn operation_applied(&self, entry: &LogEntry);

    /// A per-file failure was recovered from
    fn failure(&self, failure: &SyncFailure);

    /// The pass finished; `report` holds its counters and failures
    fn pass_completed(&self, _report: &PassReport) {}

    /// The pass was aborted before any file was touched
    fn pass_aborted(&self, _error: &Error) {}
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl SyncReporter for NullReporter {
    fn operation_applied(&self, _entry: &LogEntry) {}

    fn failure(&self, _failure: &SyncFailure) {}
}

impl<R: SyncReporter + ?Sized> SyncReporter for std::sync::Arc<R> {
    fn pass_started(&self, source: &Path, replica: &Path) {
        (**self).pass_started(source, replica);
    }

    fn operation_applied(&self, entry: &LogEntry) {
        (**self).operation_applied(entry);
    }

    fn failure(&self, failure: &SyncFailure) {
        (**self).failure(failure);
    }

    fn pass_completed(&self, report: &PassReport) {
        (**self).pass_completed(report);
    }

    fn pass_aborted(&self, error: &Error) {
        (**self).pass_aborted(error);
    }
}
