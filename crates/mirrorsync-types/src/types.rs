//! Core data types for MirrorSync
//!
//! Everything here except the log is pass-scoped: built at the start of a
//! synchronization pass and discarded at its end.

use crate::{Error, FingerprintAlgorithm, RelativePath};
use chrono::{DateTime, Local};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unique identifier for a synchronization pass
pub type PassId = uuid::Uuid;

/// `strftime` pattern of every timestamp written to the sync log
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%b-%d %H:%M:%S";

/// A set of relative file paths found beneath one root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    paths: HashSet<RelativePath>,
}

impl FileSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path, returning `false` if it was already present
    pub fn insert(&mut self, path: RelativePath) -> bool {
        self.paths.insert(path)
    }

    /// Whether the set contains `path`
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.paths.contains(path)
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate over the paths in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &RelativePath> {
        self.paths.iter()
    }

    /// Paths in lexical order, for stable output
    pub fn sorted(&self) -> Vec<&RelativePath> {
        let mut paths: Vec<_> = self.paths.iter().collect();
        paths.sort();
        paths
    }

    /// Paths in `self` but not in `other`
    pub fn difference(&self, other: &Self) -> Self {
        self.paths.difference(&other.paths).cloned().collect()
    }

    /// Paths in both `self` and `other`
    pub fn intersection(&self, other: &Self) -> Self {
        self.paths.intersection(&other.paths).cloned().collect()
    }

    /// Paths in either `self` or `other`
    pub fn union(&self, other: &Self) -> Self {
        self.paths.union(&other.paths).cloned().collect()
    }

    /// Keep only the paths for which `keep` returns true
    pub fn retain(&mut self, keep: impl FnMut(&RelativePath) -> bool) {
        self.paths.retain(keep);
    }
}

impl FromIterator<RelativePath> for FileSet {
    fn from_iter<I: IntoIterator<Item = RelativePath>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = RelativePath;
    type IntoIter = std::collections::hash_set::IntoIter<RelativePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a RelativePath;
    type IntoIter = std::collections::hash_set::Iter<'a, RelativePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// The three disjoint groups a pair of trees splits into
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    /// In the source only: copy to the replica
    pub to_create: FileSet,
    /// In both trees: compare contents
    pub common: FileSet,
    /// In the replica only: delete from the replica
    pub to_delete: FileSet,
}

impl ClassificationResult {
    /// Total number of classified paths
    pub fn total(&self) -> usize {
        self.to_create.len() + self.common.len() + self.to_delete.len()
    }

    /// Whether the three groups are pairwise disjoint and together cover
    /// exactly `source ∪ replica`
    pub fn is_partition_of(&self, source: &FileSet, replica: &FileSet) -> bool {
        let disjoint = self
            .to_create
            .iter()
            .all(|p| !self.common.contains(p) && !self.to_delete.contains(p))
            && self.common.iter().all(|p| !self.to_delete.contains(p));
        let covered = self.to_create.union(&self.common).union(&self.to_delete);
        disjoint && covered == source.union(replica)
    }
}

/// Digest of a file's full byte stream
///
/// Only equality is meaningful. Fingerprints produced by different algorithms
/// never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFingerprint {
    /// BLAKE3 digest
    Blake3([u8; 32]),
    /// XXH3-128 digest
    Xxh3(u128),
}

impl ContentFingerprint {
    /// The algorithm that produced this fingerprint
    pub fn algorithm(&self) -> FingerprintAlgorithm {
        match self {
            Self::Blake3(_) => FingerprintAlgorithm::Blake3,
            Self::Xxh3(_) => FingerprintAlgorithm::Xxh3,
        }
    }

    /// Lowercase hex rendering of the digest
    pub fn to_hex(&self) -> String {
        match self {
            Self::Blake3(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
            Self::Xxh3(value) => format!("{:032x}", value),
        }
    }
}

/// File operation recorded in the sync log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperationKind {
    /// A source file absent from the replica was copied
    CopyNew,
    /// A replica file with different content was overwritten
    CopyModified,
    /// A replica file with no source counterpart was removed
    Delete,
}

impl OperationKind {
    /// Short machine-friendly name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CopyNew => "copy-new",
            Self::CopyModified => "copy-modified",
            Self::Delete => "delete",
        }
    }
}

/// One line of the sync log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the operation was applied
    pub timestamp: DateTime<Local>,
    /// What was done
    pub kind: OperationKind,
    /// The file's key
    pub path: RelativePath,
    /// Absolute location in the replica
    pub destination: PathBuf,
}

impl LogEntry {
    /// Create an entry stamped with the current local time
    pub fn now(kind: OperationKind, path: RelativePath, destination: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            path,
            destination: destination.into(),
        }
    }

    /// The operator-facing description without the timestamp
    pub fn describe(&self) -> String {
        match self.kind {
            OperationKind::CopyNew => format!(
                "copied new file {} to {}",
                self.path,
                self.destination.display()
            ),
            OperationKind::CopyModified => format!(
                "copied modified file {} to {}",
                self.path,
                self.destination.display()
            ),
            OperationKind::Delete => format!("deleted {}", self.destination.display()),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.describe()
        )
    }
}

/// The step of a pass in which a per-file failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FailureStage {
    /// Walking a tree
    Enumerate,
    /// Comparing fingerprints
    Detect,
    /// Copying a new file
    Create,
    /// Overwriting a modified file
    Modify,
    /// Removing an orphaned file
    Delete,
    /// Removing a directory emptied by this pass
    Prune,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Enumerate => "enumerate",
            Self::Detect => "detect",
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Prune => "prune",
        };
        f.write_str(name)
    }
}

/// A recovered, per-file failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Affected file, relative to its root, when known
    pub path: Option<RelativePath>,
    /// Where in the pass it happened
    pub stage: FailureStage,
    /// What went wrong
    pub error: Error,
}

impl SyncFailure {
    /// Create a failure for a known path
    pub fn new(stage: FailureStage, path: RelativePath, error: Error) -> Self {
        Self {
            path: Some(path),
            stage,
            error,
        }
    }

    /// Create a failure that is not tied to a single key
    pub fn unkeyed(stage: FailureStage, error: Error) -> Self {
        Self {
            path: None,
            stage,
            error,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.stage, path, self.error),
            None => write!(f, "[{}] {}", self.stage, self.error),
        }
    }
}

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassStats {
    /// Files found in the source tree
    pub source_files: u64,
    /// Files found in the replica tree
    pub replica_files: u64,
    /// New files copied
    pub files_created: u64,
    /// Modified files re-copied
    pub files_modified: u64,
    /// Orphaned files removed
    pub files_deleted: u64,
    /// Common files found identical
    pub files_unchanged: u64,
    /// Empty directories removed from the replica
    pub directories_pruned: u64,
    /// Bytes written to the replica
    pub bytes_copied: u64,
}

impl PassStats {
    /// Number of file operations applied
    pub fn operations_applied(&self) -> u64 {
        self.files_created + self.files_modified + self.files_deleted
    }
}

/// Outcome of a completed pass
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Pass identifier
    pub id: PassId,
    /// Source root
    pub source: PathBuf,
    /// Replica root
    pub replica: PathBuf,
    /// Counters
    pub stats: PassStats,
    /// Every recovered failure, in the order it happened
    pub failures: Vec<SyncFailure>,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl PassReport {
    /// Create an empty report
    pub fn new(id: PassId, source: impl AsRef<Path>, replica: impl AsRef<Path>) -> Self {
        Self {
            id,
            source: source.as_ref().to_path_buf(),
            replica: replica.as_ref().to_path_buf(),
            stats: PassStats::default(),
            failures: Vec::new(),
            duration: Duration::default(),
        }
    }

    /// Whether the pass completed without any recovered failure
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures recorded at `stage`
    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &SyncFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}
