//! Integration tests for MirrorSync
//!
//! End-to-end passes over real temporary directory trees.

use chrono::NaiveDateTime;
use mirrorsync_config::ConfigBuilder;
use mirrorsync_sync::{PeriodicSync, SyncEngine, SyncOptions, SyncRequest};
use mirrorsync_tests::test_utils::{
    directories, generate_test_data, snapshot, write_file, RecordingReporter, TestTree,
};
use mirrorsync_types::{
    Error, FailureStage, FingerprintAlgorithm, OperationKind, SyncFailure, SyncReporter,
    WorkerCount,
};
use proptest::prelude::*;
use rstest::rstest;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BANNER: &str = "------------------------------ SYNC ------------------------------";
const RULE: &str = "------------------------------------------------------------------";

fn engine() -> SyncEngine {
    SyncEngine::new(SyncOptions::default())
}

fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(path, contents)| (path.to_string(), contents.as_bytes().to_vec()))
        .collect()
}

#[test]
fn test_example_scenario() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"hello");
    tree.write_source("dir/b.txt", b"x");
    let engine = engine();

    let first = engine.synchronize(&tree.request()).unwrap();

    assert!(first.is_clean());
    assert_eq!(
        snapshot(&tree.replica),
        files(&[("a.txt", "hello"), ("dir/b.txt", "x")])
    );
    assert_eq!(
        tree.operations(),
        vec![
            format!("copied new file a.txt to {}", tree.replica.join("a.txt").display()),
            format!(
                "copied new file dir/b.txt to {}",
                tree.replica.join("dir").join("b.txt").display()
            ),
        ]
    );

    tree.write_source("a.txt", b"HELLO");
    fs::remove_file(tree.source.join("dir").join("b.txt")).unwrap();
    tree.write_source("c.txt", b"new");

    let second = engine.synchronize(&tree.request()).unwrap();

    assert!(second.is_clean());
    assert_eq!(
        snapshot(&tree.replica),
        files(&[("a.txt", "HELLO"), ("c.txt", "new")])
    );
    assert!(!tree.replica.join("dir").join("b.txt").exists());
    assert_eq!(
        tree.operations()[2..].to_vec(),
        vec![
            format!("copied new file c.txt to {}", tree.replica.join("c.txt").display()),
            format!("copied modified file a.txt to {}", tree.replica.join("a.txt").display()),
            format!("deleted {}", tree.replica.join("dir").join("b.txt").display()),
        ]
    );
    assert_eq!(tree.log_contents().matches(BANNER).count(), 2);
}

#[test]
fn test_seeded_replica_converges_in_one_pass() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"hello");
    tree.write_source("c.txt", b"new");
    tree.write_replica("a.txt", b"hello");
    tree.write_replica("dir/b.txt", b"x");

    let report = engine().synchronize(&tree.request()).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.stats.files_created, 1);
    assert_eq!(report.stats.files_modified, 0);
    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.files_unchanged, 1);
    assert_eq!(report.stats.directories_pruned, 1);

    assert_eq!(
        snapshot(&tree.replica),
        files(&[("a.txt", "hello"), ("c.txt", "new")])
    );
    assert!(directories(&tree.replica).is_empty());

    assert_eq!(
        tree.operations(),
        vec![
            format!("copied new file c.txt to {}", tree.replica.join("c.txt").display()),
            format!("deleted {}", tree.replica.join("dir").join("b.txt").display()),
        ]
    );
}

#[test]
fn test_log_header_layout() {
    let tree = TestTree::new();
    fs::write(&tree.log, "earlier contents\n").unwrap();

    engine().synchronize(&tree.request()).unwrap();

    let contents = tree.log_contents();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "earlier contents");
    assert_eq!(lines[1], "");
    assert!(NaiveDateTime::parse_from_str(lines[2], "%Y-%b-%d %H:%M:%S").is_ok());
    assert_eq!(lines[3], BANNER);
    assert_eq!(lines[4], format!("      SOURCE: {}", tree.source.display()));
    assert_eq!(lines[5], format!(" DESTINATION: {}", tree.replica.display()));
    assert_eq!(lines[6], RULE);
    assert_eq!(lines.len(), 7);
}

#[test]
fn test_operation_line_timestamps() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");

    engine().synchronize(&tree.request()).unwrap();

    let lines = tree.operation_lines();
    assert_eq!(lines.len(), 1);
    let (timestamp, _) = lines[0].split_once(" - ").unwrap();
    assert!(NaiveDateTime::parse_from_str(timestamp, "%Y-%b-%d %H:%M:%S").is_ok());
}

#[test]
fn test_second_pass_is_idempotent() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"hello");
    tree.write_source("nested/deep/b.bin", &generate_test_data(200_000, 3));
    tree.write_replica("orphan.txt", b"bye");
    let engine = engine();

    engine.synchronize(&tree.request()).unwrap();
    let lines_after_first = tree.operation_lines().len();
    let second = engine.synchronize(&tree.request()).unwrap();

    assert_eq!(second.stats.operations_applied(), 0);
    assert_eq!(second.stats.files_unchanged, 2);
    assert_eq!(tree.operation_lines().len(), lines_after_first);
    assert_eq!(tree.log_contents().matches(BANNER).count(), 2);
}

#[test]
fn test_deletion_logged_exactly_once() {
    let tree = TestTree::new();
    tree.write_replica("gone.txt", b"x");
    let engine = engine();

    engine.synchronize(&tree.request()).unwrap();
    engine.synchronize(&tree.request()).unwrap();

    assert!(!tree.replica.join("gone.txt").exists());
    let deletions = tree
        .operations()
        .into_iter()
        .filter(|line| line.starts_with("deleted "))
        .count();
    assert_eq!(deletions, 1);
}

#[rstest]
#[case(FingerprintAlgorithm::Blake3)]
#[case(FingerprintAlgorithm::Xxh3)]
fn test_single_byte_change_recopied_once(#[case] algorithm: FingerprintAlgorithm) {
    let tree = TestTree::new();
    let mut data = generate_test_data(100_000, 1);
    tree.write_source("big.bin", &data);
    tree.write_source("other.txt", b"untouched");
    let engine = SyncEngine::new(SyncOptions::default().with_fingerprint(algorithm));
    engine.synchronize(&tree.request()).unwrap();

    data[54_321] ^= 0x01;
    tree.write_source("big.bin", &data);
    let report = engine.synchronize(&tree.request()).unwrap();

    assert_eq!(report.stats.files_modified, 1);
    assert_eq!(report.stats.files_unchanged, 1);
    let modified: Vec<String> = tree
        .operations()
        .into_iter()
        .filter(|line| line.starts_with("copied modified file "))
        .collect();
    assert_eq!(
        modified,
        vec![format!(
            "copied modified file big.bin to {}",
            tree.replica.join("big.bin").display()
        )]
    );
    assert_eq!(fs::read(tree.replica.join("big.bin")).unwrap(), data);
}

#[test]
fn test_operations_grouped_in_log() {
    let tree = TestTree::new();
    tree.write_source("m.txt", b"new");
    tree.write_replica("m.txt", b"old");
    tree.write_source("z.txt", b"z");
    tree.write_source("a.txt", b"a");
    tree.write_replica("b.txt", b"b");
    tree.write_replica("y.txt", b"y");

    let recorder = Arc::new(RecordingReporter::new());
    SyncEngine::new(SyncOptions::default())
        .with_reporter(recorder.clone())
        .synchronize(&tree.request())
        .unwrap();

    let kinds: Vec<OperationKind> = recorder.operations().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::CopyNew,
            OperationKind::CopyNew,
            OperationKind::CopyModified,
            OperationKind::Delete,
            OperationKind::Delete,
        ]
    );

    let logged: Vec<String> = tree.operations();
    let reported: Vec<String> = recorder.operations().iter().map(|e| e.describe()).collect();
    assert_eq!(logged, reported);
}

#[test]
fn test_failure_isolated_to_one_path() {
    let tree = TestTree::new();
    tree.write_source("ok-1.txt", b"1");
    tree.write_source("clash", b"source has a file here");
    tree.write_source("ok-2.txt", b"2");
    tree.write_replica("clash/inner.txt", b"replica has a directory here");

    let recorder = Arc::new(RecordingReporter::new());
    let engine = SyncEngine::new(SyncOptions::default()).with_reporter(recorder.clone());
    let report = engine.synchronize(&tree.request()).unwrap();

    assert_eq!(report.stats.files_created, 2);
    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Create);
    assert_eq!(report.failures[0].path.as_ref().unwrap().as_str(), "clash");
    assert!(matches!(report.failures[0].error, Error::Write { .. }));
    assert_eq!(recorder.failures(), report.failures);
    assert!(tree.replica.join("ok-1.txt").exists());
    assert!(tree.replica.join("ok-2.txt").exists());
    assert!(!tree
        .operations()
        .iter()
        .any(|line| line.contains("copied new file clash ")));

    let second = engine.synchronize(&tree.request()).unwrap();
    assert!(second.is_clean());
    assert_eq!(snapshot(&tree.replica), snapshot(&tree.source));
}

/// Removes a source file as soon as enumeration reports a problem, so the file
/// is gone by the time its contents are compared
#[cfg(unix)]
struct VanishingSource {
    victim: PathBuf,
    failures: Mutex<Vec<SyncFailure>>,
}

#[cfg(unix)]
impl SyncReporter for VanishingSource {
    fn operation_applied(&self, _entry: &mirrorsync_types::LogEntry) {}

    fn failure(&self, failure: &SyncFailure) {
        if failure.stage == FailureStage::Enumerate {
            let _ = fs::remove_file(&self.victim);
        }
        self.failures.lock().unwrap().push(failure.clone());
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_common_file_isolated_to_detection() {
    let tree = TestTree::new();
    tree.write_source("new.txt", b"new");
    tree.write_source("same.txt", b"same");
    tree.write_replica("same.txt", b"same");
    tree.write_source("changed.txt", b"after");
    tree.write_replica("changed.txt", b"before");
    tree.write_source("victim.txt", b"v");
    tree.write_replica("victim.txt", b"v");
    tree.write_replica("orphan.txt", b"o");
    fs::create_dir_all(tree.source.join("cycle")).unwrap();
    std::os::unix::fs::symlink(tree.source.join("cycle"), tree.source.join("cycle/again"))
        .unwrap();

    let reporter = Arc::new(VanishingSource {
        victim: tree.source.join("victim.txt"),
        failures: Mutex::new(Vec::new()),
    });
    let report = SyncEngine::new(SyncOptions::default().with_follow_symlinks(true))
        .with_reporter(reporter.clone())
        .synchronize(&tree.request())
        .unwrap();

    let detect: Vec<_> = report.failures_at(FailureStage::Detect).collect();
    assert_eq!(detect.len(), 1);
    assert_eq!(detect[0].path.as_ref().unwrap().as_str(), "victim.txt");
    assert!(matches!(detect[0].error, Error::Read { .. }));
    assert!(!detect[0].error.is_fatal());
    assert!(reporter.failures.lock().unwrap().contains(detect[0]));

    assert_eq!(report.stats.files_created, 1);
    assert_eq!(report.stats.files_modified, 1);
    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.files_unchanged, 1);
    assert_eq!(
        snapshot(&tree.replica),
        files(&[
            ("changed.txt", "after"),
            ("new.txt", "new"),
            ("same.txt", "same"),
            ("victim.txt", "v"),
        ])
    );
    assert!(!tree.operations().iter().any(|line| line.contains("victim.txt")));
}

#[test]
fn test_log_open_failure_aborts_before_mutation() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");
    tree.write_replica("orphan.txt", b"o");
    let request = SyncRequest::new(
        &tree.source,
        &tree.replica,
        tree.root().join("no-such-dir").join("sync.log"),
    );

    let recorder = Arc::new(RecordingReporter::new());
    let error = SyncEngine::new(SyncOptions::default())
        .with_reporter(recorder.clone())
        .synchronize(&request)
        .unwrap_err();

    assert!(matches!(error, Error::LogOpen { .. }));
    assert!(error.is_fatal());
    assert_eq!(recorder.aborted(), vec![error]);
    assert!(recorder.operations().is_empty());
    assert!(!tree.replica.join("a.txt").exists());
    assert!(tree.replica.join("orphan.txt").exists());
}

#[test]
fn test_log_open_failure_leaves_missing_replica_uncreated() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");
    let replica = tree.root().join("fresh-replica");
    let request = SyncRequest::new(&tree.source, &replica, tree.root().join("nope/sync.log"));

    let error = engine().synchronize(&request).unwrap_err();

    assert!(matches!(error, Error::LogOpen { .. }));
    assert!(!replica.exists());
}

#[test]
fn test_missing_source_is_fatal() {
    let tree = TestTree::new();
    tree.write_replica("keep.txt", b"k");
    fs::remove_dir(&tree.source).unwrap();

    let error = engine().synchronize(&tree.request()).unwrap_err();

    assert_eq!(
        error,
        Error::PathNotFound {
            path: tree.source.clone()
        }
    );
    assert!(tree.replica.join("keep.txt").exists());
}

#[test]
fn test_missing_replica_created() {
    let tree = TestTree::new();
    tree.write_source("dir/a.txt", b"a");
    let replica = tree.root().join("new").join("replica");
    let request = SyncRequest::new(&tree.source, &replica, &tree.log);

    let report = engine().synchronize(&request).unwrap();

    assert_eq!(report.stats.files_created, 1);
    assert_eq!(snapshot(&replica), snapshot(&tree.source));
}

#[rstest]
#[case(2)]
#[case(8)]
fn test_parallel_apply_matches_sequential(#[case] workers: usize) {
    let sequential = TestTree::new();
    let parallel = TestTree::new();
    for tree in [&sequential, &parallel] {
        for i in 0..60 {
            let path = format!("d{}/file-{}.bin", i % 6, i);
            tree.write_source(&path, &generate_test_data(512 + i, i as u8));
        }
        for i in 0..20 {
            tree.write_replica(&format!("d{}/file-{}.bin", i % 6, i), b"stale");
        }
        for i in 0..15 {
            tree.write_replica(&format!("orphans/{}/x.txt", i % 3), b"x");
            tree.write_replica(&format!("o{}.txt", i), b"x");
        }
    }

    let first = engine().synchronize(&sequential.request()).unwrap();
    let second = SyncEngine::new(
        SyncOptions::default().with_workers(WorkerCount::new(workers).unwrap()),
    )
    .synchronize(&parallel.request())
    .unwrap();

    assert_eq!(first.stats, second.stats);
    assert!(second.is_clean());
    assert_eq!(snapshot(&parallel.replica), snapshot(&parallel.source));
    assert_eq!(snapshot(&sequential.replica), snapshot(&parallel.replica));
    assert_eq!(directories(&sequential.replica), directories(&parallel.replica));

    let strip = |tree: &TestTree| -> Vec<String> {
        let mut lines: Vec<String> = tree
            .operations()
            .into_iter()
            .map(|line| line.replace(&tree.root().display().to_string(), "<root>"))
            .collect();
        lines.sort();
        lines
    };
    assert_eq!(strip(&sequential), strip(&parallel));
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_mirrored_by_default() {
    let tree = TestTree::new();
    tree.write_source("real.txt", b"r");
    write_file(tree.root(), "outside/secret.txt", b"s");
    std::os::unix::fs::symlink(tree.root().join("outside"), tree.source.join("link")).unwrap();

    engine().synchronize(&tree.request()).unwrap();

    assert_eq!(snapshot(&tree.replica).keys().collect::<Vec<_>>(), vec!["real.txt"]);

    let following = SyncEngine::new(SyncOptions::default().with_follow_symlinks(true));
    following.synchronize(&tree.request()).unwrap();
    assert!(tree.replica.join("link").join("secret.txt").is_file());
    assert!(!tree.replica.join("link").is_symlink());
}

#[cfg(unix)]
#[test]
fn test_replica_links_unlinked_even_when_following() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");
    write_file(tree.root(), "precious/data.txt", b"keep");
    std::os::unix::fs::symlink(tree.root().join("precious"), tree.replica.join("link")).unwrap();

    let report = SyncEngine::new(SyncOptions::default().with_follow_symlinks(true))
        .synchronize(&tree.request())
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.stats.files_deleted, 1);
    assert!(!tree.replica.join("link").is_symlink());
    assert_eq!(
        fs::read(tree.root().join("precious").join("data.txt")).unwrap(),
        b"keep"
    );
    assert_eq!(
        tree.operations(),
        vec![
            format!("copied new file a.txt to {}", tree.replica.join("a.txt").display()),
            format!("deleted {}", tree.replica.join("link").display()),
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_replica_links_never_written_through() {
    let tree = TestTree::new();
    tree.write_source("dir/b.txt", b"b");
    tree.write_source("a.txt", b"source a");
    write_file(tree.root(), "outside/target.txt", b"target");
    std::os::unix::fs::symlink(tree.root().join("outside"), tree.replica.join("dir")).unwrap();
    std::os::unix::fs::symlink(
        tree.root().join("outside").join("target.txt"),
        tree.replica.join("a.txt"),
    )
    .unwrap();
    let engine = engine();

    let first = engine.synchronize(&tree.request()).unwrap();

    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].stage, FailureStage::Create);
    assert_eq!(first.failures[0].path.as_ref().unwrap().as_str(), "dir/b.txt");
    assert_eq!(first.stats.files_modified, 1);
    assert_eq!(first.stats.files_deleted, 1);
    assert!(!tree.root().join("outside").join("b.txt").exists());
    assert_eq!(
        fs::read(tree.root().join("outside").join("target.txt")).unwrap(),
        b"target"
    );

    let second = engine.synchronize(&tree.request()).unwrap();

    assert!(second.is_clean());
    assert_eq!(second.stats.files_created, 1);
    assert_eq!(snapshot(&tree.replica), snapshot(&tree.source));
    assert!(!tree.replica.join("dir").is_symlink());
    assert!(!tree.replica.join("a.txt").is_symlink());
    assert!(!tree.root().join("outside").join("b.txt").exists());
}

#[test]
fn test_engine_built_from_config_file() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");
    tree.write_replica("gone/x.txt", b"x");
    let config_path = tree.root().join("mirrorsync.yaml");
    let mut file = fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        "sync:\n  fingerprint: xxh3\n  prune_empty_dirs: false\n  workers: 3\n"
    )
    .unwrap();

    let config = ConfigBuilder::new()
        .add_source_file(&config_path)
        .build()
        .unwrap();
    let options = SyncOptions::from(&config.sync);
    assert_eq!(options.fingerprint, FingerprintAlgorithm::Xxh3);

    let report = SyncEngine::new(options).synchronize(&tree.request()).unwrap();

    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.directories_pruned, 0);
    assert!(tree.replica.join("gone").is_dir());
}

#[tokio::test]
async fn test_scheduler_converges_and_logs_each_pass() {
    let tree = TestTree::new();
    tree.write_source("a.txt", b"a");
    let recorder = Arc::new(RecordingReporter::new());
    let engine =
        Arc::new(SyncEngine::new(SyncOptions::default()).with_reporter(recorder.clone()));

    let summary = PeriodicSync::new(engine, tree.request(), Duration::from_millis(10))
        .unwrap()
        .with_max_passes(3)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.passes, 3);
    assert_eq!(recorder.passes_started(), 3);
    assert_eq!(recorder.completed().len(), 3);
    assert_eq!(recorder.operations().len(), 1);
    assert_eq!(tree.log_contents().matches(BANNER).count(), 3);
}

fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    proptest::collection::btree_map(
        "d[0-2]/f[0-4]",
        proptest::collection::vec(any::<u8>(), 0..64),
        0..12,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_one_pass_makes_replica_equal_source(
        source in tree_strategy(),
        replica in tree_strategy(),
    ) {
        let tree = TestTree::new();
        for (path, contents) in &source {
            tree.write_source(path, contents);
        }
        for (path, contents) in &replica {
            tree.write_replica(path, contents);
        }

        let report = engine().synchronize(&tree.request()).unwrap();

        prop_assert!(report.is_clean());
        prop_assert_eq!(snapshot(&tree.replica), source.clone());

        let again = engine().synchronize(&tree.request()).unwrap();
        prop_assert_eq!(again.stats.operations_applied(), 0);
        prop_assert_eq!(again.stats.files_unchanged as usize, source.len());
    }
}
