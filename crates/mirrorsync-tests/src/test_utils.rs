//! Shared fixtures for MirrorSync tests and benchmarks

use mirrorsync_sync::SyncRequest;
use mirrorsync_types::{Error, LogEntry, PassReport, SyncFailure, SyncReporter};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use walkdir::WalkDir;

/// A temporary source tree, replica tree and sync log
pub struct TestTree {
    temp_dir: TempDir,
    /// Source root
    pub source: PathBuf,
    /// Replica root
    pub replica: PathBuf,
    /// Sync log path
    pub log: PathBuf,
}

impl TestTree {
    /// Create empty source and replica roots
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source).expect("Failed to create source root");
        fs::create_dir_all(&replica).expect("Failed to create replica root");
        let log = temp_dir.path().join("sync.log");

        Self {
            temp_dir,
            source,
            replica,
            log,
        }
    }

    /// The directory holding both roots and the log
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The request mirroring this tree's source onto its replica
    pub fn request(&self) -> SyncRequest {
        SyncRequest::new(&self.source, &self.replica, &self.log)
    }

    /// Write a file beneath the source root, creating parents
    pub fn write_source(&self, path: &str, contents: &[u8]) {
        write_file(&self.source, path, contents);
    }

    /// Write a file beneath the replica root, creating parents
    pub fn write_replica(&self, path: &str, contents: &[u8]) {
        write_file(&self.replica, path, contents);
    }

    /// Contents of the sync log, empty if it does not exist
    pub fn log_contents(&self) -> String {
        fs::read_to_string(&self.log).unwrap_or_default()
    }

    /// Operation lines of the sync log, header lines excluded
    pub fn operation_lines(&self) -> Vec<String> {
        self.log_contents()
            .lines()
            .filter(|line| line.contains(" - "))
            .map(str::to_string)
            .collect()
    }

    /// Operation lines with their timestamps stripped
    pub fn operations(&self) -> Vec<String> {
        self.operation_lines()
            .into_iter()
            .filter_map(|line| line.split_once(" - ").map(|(_, rest)| rest.to_string()))
            .collect()
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `contents` to `root/path`, creating parent directories
pub fn write_file(root: &Path, path: &str, contents: &[u8]) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(full, contents).expect("Failed to write test file");
}

/// Every regular file beneath `root`, keyed by `/`-separated relative path
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("Walk left its root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let contents = fs::read(entry.path()).expect("Failed to read test file");
            (relative, contents)
        })
        .collect()
}

/// Every directory beneath `root`, as `/`-separated relative paths
pub fn directories(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .expect("Walk left its root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

/// Deterministic test data
pub fn generate_test_data(size: usize, seed: u8) -> Vec<u8> {
    (0..size)
        .map(|i| ((i * 7 + 13) % 256) as u8 ^ seed)
        .collect()
}

/// Reporter that keeps every event it receives
#[derive(Default)]
pub struct RecordingReporter {
    started: Mutex<u64>,
    operations: Mutex<Vec<LogEntry>>,
    failures: Mutex<Vec<SyncFailure>>,
    completed: Mutex<Vec<PassReport>>,
    aborted: Mutex<Vec<Error>>,
}

impl RecordingReporter {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passes started
    pub fn passes_started(&self) -> u64 {
        *self.started.lock().unwrap()
    }

    /// Operations applied, in the order they were reported
    pub fn operations(&self) -> Vec<LogEntry> {
        self.operations.lock().unwrap().clone()
    }

    /// Failures reported
    pub fn failures(&self) -> Vec<SyncFailure> {
        self.failures.lock().unwrap().clone()
    }

    /// Reports of completed passes
    pub fn completed(&self) -> Vec<PassReport> {
        self.completed.lock().unwrap().clone()
    }

    /// Errors of aborted passes
    pub fn aborted(&self) -> Vec<Error> {
        self.aborted.lock().unwrap().clone()
    }
}

impl SyncReporter for RecordingReporter {
    fn pass_started(&self, _source: &Path, _replica: &Path) {
        *self.started.lock().unwrap() += 1;
    }

    fn operation_applied(&self, entry: &LogEntry) {
        self.operations.lock().unwrap().push(entry.clone());
    }

    fn failure(&self, failure: &SyncFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }

    fn pass_completed(&self, report: &PassReport) {
        self.completed.lock().unwrap().push(report.clone());
    }

    fn pass_aborted(&self, error: &Error) {
        self.aborted.lock().unwrap().push(error.clone());
    }
}
