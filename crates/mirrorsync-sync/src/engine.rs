//! Main synchronization engine
//!
//! One call to [`SyncEngine::synchronize`] is one pass: validate the roots,
//! open the log, enumerate both trees, classify, detect modifications, then
//! apply creates, modifications and deletions in that order. Only root-level
//! setup failures abort a pass, and they all happen before the replica is
//! touched.

use crate::{
    apply::SyncApplier,
    classify::classify_with_exclusions,
    fingerprint::ChangeDetector,
    journal::SyncJournal,
    scan::{check_root, TreeEnumerator, TreeScan},
};
use chrono::Local;
use mirrorsync_config::SyncSettings;
use mirrorsync_types::{
    BufferSize, Error, FailureStage, FingerprintAlgorithm, NullReporter, PassId, PassReport,
    RelativePath, Result, SyncFailure, SyncReporter, WorkerCount,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// What to mirror where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Source directory path
    pub source: PathBuf,
    /// Replica directory path
    pub replica: PathBuf,
    /// Sync log path
    pub log_file: PathBuf,
}

impl SyncRequest {
    /// Create a new sync request
    pub fn new(
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            log_file: log_file.into(),
        }
    }
}

/// Synchronization options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Digest used to compare common files
    pub fingerprint: FingerprintAlgorithm,
    /// Follow symbolic links while enumerating the source
    pub follow_symlinks: bool,
    /// Create a missing replica root
    pub create_replica: bool,
    /// Remove replica directories emptied by deletions
    pub prune_empty_dirs: bool,
    /// Threads applying each group of operations
    pub workers: WorkerCount,
    /// Read buffer for hashing and copying
    pub buffer_size: BufferSize,
}

impl SyncOptions {
    /// Set the fingerprint algorithm
    pub fn with_fingerprint(mut self, fingerprint: FingerprintAlgorithm) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Set whether symbolic links in the source are followed
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set whether a missing replica root is created
    pub fn with_create_replica(mut self, create: bool) -> Self {
        self.create_replica = create;
        self
    }

    /// Set whether emptied directories are pruned
    pub fn with_prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = prune;
        self
    }

    /// Set the number of apply workers
    pub fn with_workers(mut self, workers: WorkerCount) -> Self {
        self.workers = workers;
        self
    }

    /// Set the I/O buffer size
    pub fn with_buffer_size(mut self, buffer_size: BufferSize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            fingerprint: settings.fingerprint,
            follow_symlinks: settings.follow_symlinks,
            create_replica: settings.create_replica,
            prune_empty_dirs: settings.prune_empty_dirs,
            workers: settings.workers,
            buffer_size: settings.buffer_size,
        }
    }
}

/// Runs synchronization passes
pub struct SyncEngine {
    options: SyncOptions,
    reporter: Arc<dyn SyncReporter>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine that reports nothing
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Send pass events to `reporter`
    pub fn with_reporter(mut self, reporter: Arc<dyn SyncReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The engine's options
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one pass, making `request.replica` mirror `request.source`
    ///
    /// Returns `Err` only when the pass was aborted before the replica was
    /// touched. Per-file failures are in the returned report.
    pub fn synchronize(&self, request: &SyncRequest) -> Result<PassReport> {
        let id = PassId::new_v4();
        let span = info_span!("pass", id = %id);
        let _enter = span.enter();

        let started = Instant::now();
        info!(
            "Syncing '{}' -> '{}'",
            request.source.display(),
            request.replica.display()
        );
        self.reporter
            .pass_started(&request.source, &request.replica);

        match self.run_pass(id, request) {
            Ok(mut report) => {
                report.duration = started.elapsed();
                info!(
                    "Pass finished in {:?}: {} created, {} modified, {} deleted, {} failures",
                    report.duration,
                    report.stats.files_created,
                    report.stats.files_modified,
                    report.stats.files_deleted,
                    report.failures.len()
                );
                self.reporter.pass_completed(&report);
                Ok(report)
            }
            Err(e) => {
                error!("Pass aborted: {}", e);
                self.reporter.pass_aborted(&e);
                Err(e)
            }
        }
    }

    fn run_pass(&self, id: PassId, request: &SyncRequest) -> Result<PassReport> {
        let source = request.source.as_path();
        let replica = request.replica.as_path();

        check_root(source)?;

        let mut journal = SyncJournal::open(&request.log_file)?;
        journal.write_header(source, replica, Local::now())?;

        self.prepare_replica(replica)?;

        let mut report = PassReport::new(id, source, replica);

        let source_scan = TreeEnumerator::source(self.options.follow_symlinks).enumerate(source)?;
        let replica_scan = TreeEnumerator::replica().enumerate(replica)?;
        self.collect(&mut report, source_scan.failures.iter().cloned());
        self.collect(&mut report, replica_scan.failures.iter().cloned());

        let TreeScan {
            files: source_files,
            unreadable_dirs,
            ..
        } = source_scan;
        let replica_files = replica_scan.files;
        report.stats.source_files = source_files.len() as u64;
        report.stats.replica_files = replica_files.len() as u64;

        if !unreadable_dirs.is_empty() {
            warn!(
                "{} unreadable source directories; their replica copies are kept",
                unreadable_dirs.len()
            );
        }
        let classification =
            classify_with_exclusions(&source_files, &replica_files, &unreadable_dirs);
        debug!(
            "Classified {} paths: {} new, {} common, {} orphaned",
            classification.total(),
            classification.to_create.len(),
            classification.common.len(),
            classification.to_delete.len()
        );

        let detector = ChangeDetector::new(self.options.fingerprint, self.options.buffer_size);
        let mut modified: Vec<&RelativePath> = Vec::new();
        for path in classification.common.sorted() {
            match detector.is_modified(source, replica, path) {
                Ok(true) => modified.push(path),
                Ok(false) => report.stats.files_unchanged += 1,
                Err(e) => {
                    warn!("{}: {}", path, e);
                    self.collect(
                        &mut report,
                        [SyncFailure::new(FailureStage::Detect, path.clone(), e)],
                    );
                }
            }
        }
        debug!(
            "{} of {} common files modified",
            modified.len(),
            classification.common.len()
        );

        let applier = SyncApplier::new(source, replica, journal, self.reporter.as_ref())
            .with_workers(self.options.workers)
            .with_buffer_size(self.options.buffer_size);

        let created = applier.create_all(&classification.to_create.sorted());
        report.stats.files_created = created.applied;
        report.stats.bytes_copied += created.bytes;
        self.collect(&mut report, created.failures);

        let updated = applier.modify_all(&modified);
        report.stats.files_modified = updated.applied;
        report.stats.bytes_copied += updated.bytes;
        self.collect(&mut report, updated.failures);

        let deleted = applier.delete_all(&classification.to_delete.sorted());
        report.stats.files_deleted = deleted.applied;
        self.collect(&mut report, deleted.failures);

        if self.options.prune_empty_dirs && !deleted.applied_paths.is_empty() {
            let pruned = applier.prune_empty_dirs(&deleted.applied_paths);
            report.stats.directories_pruned = pruned.removed;
            report.failures.extend(pruned.failures);
        }

        Ok(report)
    }

    fn prepare_replica(&self, replica: &Path) -> Result<()> {
        match fs::metadata(replica) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Error::NotADirectory {
                path: replica.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !self.options.create_replica {
                    return Err(Error::PathNotFound {
                        path: replica.to_path_buf(),
                    });
                }
                fs::create_dir_all(replica).map_err(|e| Error::write(replica, e))?;
                info!("Created replica root '{}'", replica.display());
                Ok(())
            }
            Err(e) => Err(Error::read(replica, e)),
        }
    }

    fn collect(&self, report: &mut PassReport, failures: impl IntoIterator<Item = SyncFailure>) {
        for failure in failures {
            self.reporter.failure(&failure);
            report.failures.push(failure);
        }
    }
}
