//! Applying file operations to the replica
//!
//! Operations run in three groups: creates, then modifications, then deletions.
//! Within a group each path is independent; a failure is recorded against that
//! path and the group carries on. With more than one worker a group is spread
//! over a rayon pool, results keep input order, and journal appends are
//! serialized through a mutex.
//!
//! Nothing is ever written or removed through a symbolic link in the replica:
//! a linked directory on the way to a path fails that path, and a linked file
//! being replaced is unlinked first.

use crate::journal::SyncJournal;
use mirrorsync_types::{
    BufferSize, Error, FailureStage, LogEntry, OperationKind, RelativePath, Result, SyncFailure,
    SyncReporter, WorkerCount,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// A file operation that took effect
#[derive(Debug, Clone)]
pub struct Applied {
    /// The line written (or meant to be written) to the sync log
    pub entry: LogEntry,
    /// Bytes written to the replica
    pub bytes: u64,
    /// Set when the operation happened but its log line could not be appended
    pub journal_error: Option<Error>,
}

/// Aggregate outcome of one group of operations
#[derive(Debug, Clone, Default)]
pub struct GroupOutcome {
    /// Operations that took effect
    pub applied: u64,
    /// Bytes written to the replica
    pub bytes: u64,
    /// Keys of the operations that took effect, in input order
    pub applied_paths: Vec<RelativePath>,
    /// Recovered failures, in input order
    pub failures: Vec<SyncFailure>,
}

/// Result of pruning directories emptied by deletions
#[derive(Debug, Clone, Default)]
pub struct PruneOutcome {
    /// Directories removed
    pub removed: u64,
    /// Directories that could not be inspected or removed
    pub failures: Vec<SyncFailure>,
}

enum PathOutcome {
    Applied(Applied),
    Failed(Error),
}

/// Applies copy and delete operations to one replica
pub struct SyncApplier<'a> {
    source: &'a Path,
    replica: &'a Path,
    journal: Mutex<SyncJournal>,
    reporter: &'a dyn SyncReporter,
    pool: Option<ThreadPool>,
    buffer_size: BufferSize,
}

impl<'a> SyncApplier<'a> {
    /// Create an applier that logs through `journal`
    pub fn new(
        source: &'a Path,
        replica: &'a Path,
        journal: SyncJournal,
        reporter: &'a dyn SyncReporter,
    ) -> Self {
        Self {
            source,
            replica,
            journal: Mutex::new(journal),
            reporter,
            pool: None,
            buffer_size: BufferSize::default(),
        }
    }

    /// Spread each group over `workers` threads
    ///
    /// Falls back to sequential application if the pool cannot be started.
    pub fn with_workers(mut self, workers: WorkerCount) -> Self {
        self.pool = None;
        if workers.is_parallel() {
            match ThreadPoolBuilder::new()
                .num_threads(workers.get())
                .thread_name(|index| format!("mirrorsync-apply-{}", index))
                .build()
            {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => warn!(
                    "Failed to start {} apply workers, applying sequentially: {}",
                    workers.get(),
                    e
                ),
            }
        }
        self
    }

    /// Copy in chunks of `buffer_size`
    pub fn with_buffer_size(mut self, buffer_size: BufferSize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Give the journal back
    pub fn into_journal(self) -> SyncJournal {
        self.journal
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy a file that the replica does not have yet
    ///
    /// Parent directories are created as needed. An existing destination is
    /// never overwritten.
    pub fn apply_create(&self, path: &RelativePath) -> Result<Applied> {
        let from = path.join_to(self.source);
        let to = path.join_to(self.replica);

        self.check_parents(path)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }

        let bytes = self.copy_file(&from, &to, true)?;
        debug!("Copied new file {} ({} bytes)", path, bytes);
        Ok(self.record(OperationKind::CopyNew, path, to, bytes))
    }

    /// Overwrite a replica file whose content differs from the source
    ///
    /// A replica symbolic link is replaced by a regular file; its target is
    /// left alone.
    pub fn apply_modified(&self, path: &RelativePath) -> Result<Applied> {
        let from = path.join_to(self.source);
        let to = path.join_to(self.replica);

        self.check_parents(path)?;
        let replaced_link = is_symlink(&to);
        if replaced_link {
            fs::remove_file(&to).map_err(|e| Error::write(&to, e))?;
        }

        let bytes = self.copy_file(&from, &to, replaced_link)?;
        debug!("Copied modified file {} ({} bytes)", path, bytes);
        Ok(self.record(OperationKind::CopyModified, path, to, bytes))
    }

    /// Remove a replica file with no source counterpart
    pub fn apply_delete(&self, path: &RelativePath) -> Result<Applied> {
        let target = path.join_to(self.replica);

        self.check_parents(path)?;
        fs::remove_file(&target).map_err(|e| Error::delete(&target, e))?;
        debug!("Deleted {}", path);
        Ok(self.record(OperationKind::Delete, path, target, 0))
    }

    /// Copy every path in `paths` that the replica lacks
    pub fn create_all(&self, paths: &[&RelativePath]) -> GroupOutcome {
        self.run_group(paths, FailureStage::Create, |path| self.apply_create(path))
    }

    /// Overwrite every path in `paths`
    pub fn modify_all(&self, paths: &[&RelativePath]) -> GroupOutcome {
        self.run_group(paths, FailureStage::Modify, |path| self.apply_modified(path))
    }

    /// Delete every path in `paths`
    pub fn delete_all(&self, paths: &[&RelativePath]) -> GroupOutcome {
        self.run_group(paths, FailureStage::Delete, |path| self.apply_delete(path))
    }

    /// Remove replica directories that `deleted` left empty, deepest first
    ///
    /// Only ancestors of deleted files are considered, so the replica root and
    /// directories that were already empty are never touched.
    pub fn prune_empty_dirs(&self, deleted: &[RelativePath]) -> PruneOutcome {
        let mut candidates = BTreeSet::new();
        for path in deleted {
            let mut current = path.parent();
            while let Some(dir) = current {
                current = dir.parent();
                candidates.insert(dir);
            }
        }

        let mut ordered: Vec<RelativePath> = candidates.into_iter().collect();
        ordered.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });

        let mut outcome = PruneOutcome::default();
        for dir in ordered {
            let full = dir.join_to(self.replica);
            match is_empty_dir(&full) {
                Ok(true) => match fs::remove_dir(&full) {
                    Ok(()) => {
                        debug!("Pruned empty directory {}", dir);
                        outcome.removed += 1;
                    }
                    Err(e) => {
                        let failure =
                            SyncFailure::new(FailureStage::Prune, dir, Error::delete(&full, e));
                        warn!("{}", failure);
                        self.reporter.failure(&failure);
                        outcome.failures.push(failure);
                    }
                },
                Ok(false) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    let failure =
                        SyncFailure::new(FailureStage::Prune, dir, Error::read(&full, e));
                    warn!("{}", failure);
                    self.reporter.failure(&failure);
                    outcome.failures.push(failure);
                }
            }
        }
        outcome
    }

    fn run_group<F>(&self, paths: &[&RelativePath], stage: FailureStage, op: F) -> GroupOutcome
    where
        F: Fn(&RelativePath) -> Result<Applied> + Sync,
    {
        let outcomes: Vec<PathOutcome> = match &self.pool {
            Some(pool) if paths.len() > 1 => pool.install(|| {
                paths
                    .par_iter()
                    .map(|path| self.run_one(path, &op))
                    .collect()
            }),
            _ => paths.iter().map(|path| self.run_one(path, &op)).collect(),
        };

        let mut group = GroupOutcome::default();
        for (path, outcome) in paths.iter().zip(outcomes) {
            match outcome {
                PathOutcome::Applied(applied) => {
                    group.applied += 1;
                    group.bytes += applied.bytes;
                    group.applied_paths.push((*path).clone());
                    if let Some(error) = applied.journal_error {
                        group
                            .failures
                            .push(SyncFailure::new(stage, (*path).clone(), error));
                    }
                }
                PathOutcome::Failed(error) => {
                    group
                        .failures
                        .push(SyncFailure::new(stage, (*path).clone(), error));
                }
            }
        }
        group
    }

    fn run_one<F>(&self, path: &RelativePath, op: &F) -> PathOutcome
    where
        F: Fn(&RelativePath) -> Result<Applied>,
    {
        match op(path) {
            Ok(applied) => {
                self.reporter.operation_applied(&applied.entry);
                if let Some(error) = &applied.journal_error {
                    warn!("{}: operation applied but not logged: {}", path, error);
                }
                PathOutcome::Applied(applied)
            }
            Err(error) => {
                warn!("{}: {}", path, error);
                PathOutcome::Failed(error)
            }
        }
    }

    /// Fail if a directory between the replica root and `path` is a link
    fn check_parents(&self, path: &RelativePath) -> Result<()> {
        let mut current = path.parent();
        while let Some(dir) = current {
            let full = dir.join_to(self.replica);
            if is_symlink(&full) {
                return Err(Error::write(&full, "replica directory is a symbolic link"));
            }
            current = dir.parent();
        }
        Ok(())
    }

    fn record(
        &self,
        kind: OperationKind,
        path: &RelativePath,
        destination: PathBuf,
        bytes: u64,
    ) -> Applied {
        let entry = LogEntry::now(kind, path.clone(), destination);
        let journal_error = self
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&entry)
            .err();

        Applied {
            entry,
            bytes,
            journal_error,
        }
    }

    fn copy_file(&self, from: &Path, to: &Path, create_new: bool) -> Result<u64> {
        let mut reader = File::open(from).map_err(|e| Error::read(from, e))?;

        let mut options = OpenOptions::new();
        options.write(true);
        if create_new {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let mut writer = options.open(to).map_err(|e| Error::write(to, e))?;

        let mut buffer = vec![0u8; self.buffer_size.get()];
        let mut total = 0u64;
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::read(from, e)),
            };
            writer
                .write_all(&buffer[..read])
                .map_err(|e| Error::write(to, e))?;
            total += read as u64;
        }
        writer.flush().map_err(|e| Error::write(to, e))?;

        Ok(total)
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
}
