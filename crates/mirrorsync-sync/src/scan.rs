//! Tree enumeration
//!
//! Walks a root directory and collects the relative path of every regular file
//! beneath it. In a source tree symbolic links are skipped unless following is
//! enabled; when it is, `walkdir`'s ancestor check reports link cycles as
//! per-entry failures instead of looping. A replica tree is never followed
//! through links: each link is listed as a leaf entry so that it is unlinked
//! like any other orphan, and nothing outside the replica root is reached.

use mirrorsync_types::{Error, FailureStage, FileSet, RelativePath, Result, SyncFailure};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of walking one tree
#[derive(Debug, Clone, Default)]
pub struct TreeScan {
    /// Every regular file found
    pub files: FileSet,
    /// Entries that could not be read; the walk went on without them
    pub failures: Vec<SyncFailure>,
    /// Directories whose contents could not be listed
    pub unreadable_dirs: Vec<RelativePath>,
}

/// Walks a directory tree into a [`FileSet`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeEnumerator {
    follow_symlinks: bool,
    links_as_entries: bool,
}

impl TreeEnumerator {
    /// Enumerator for a source tree
    pub fn source(follow_symlinks: bool) -> Self {
        Self {
            follow_symlinks,
            links_as_entries: false,
        }
    }

    /// Enumerator for a replica tree: links are listed, never descended into
    pub fn replica() -> Self {
        Self {
            follow_symlinks: false,
            links_as_entries: true,
        }
    }

    /// Enumerate every regular file beneath `root`
    ///
    /// Fails only when `root` itself is missing, not a directory, or cannot be
    /// listed. Problems further down are collected in [`TreeScan::failures`].
    pub fn enumerate(&self, root: &Path) -> Result<TreeScan> {
        check_root(root)?;

        let mut scan = TreeScan::default();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(self.follow_symlinks);

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    let is_link_entry = self.links_as_entries && file_type.is_symlink();
                    if !file_type.is_file() && !is_link_entry {
                        if entry.path_is_symlink() {
                            debug!("Skipping symlink: {}", entry.path().display());
                        }
                        continue;
                    }

                    match RelativePath::from_root(root, entry.path()) {
                        Ok(path) => {
                            let inserted = scan.files.insert(path);
                            debug_assert!(inserted, "walk yielded a file twice");
                        }
                        Err(e) => {
                            warn!("Skipping '{}': {}", entry.path().display(), e);
                            scan.failures
                                .push(SyncFailure::unkeyed(FailureStage::Enumerate, e));
                        }
                    }
                }
                Err(err) => {
                    let Some(path) = err.path().map(Path::to_path_buf) else {
                        scan.failures.push(SyncFailure::unkeyed(
                            FailureStage::Enumerate,
                            Error::read(root, &err),
                        ));
                        continue;
                    };

                    if err.depth() == 0 {
                        return Err(Error::read(root, &err));
                    }

                    warn!("Failed to read '{}': {}", path.display(), err);
                    let relative = RelativePath::from_root(root, &path).ok();
                    if path.is_dir() {
                        if let Some(dir) = &relative {
                            scan.unreadable_dirs.push(dir.clone());
                        }
                    }
                    scan.failures.push(SyncFailure {
                        path: relative,
                        stage: FailureStage::Enumerate,
                        error: Error::read(&path, &err),
                    });
                }
            }
        }

        info!("Scanned {} files in '{}'", scan.files.len(), root.display());
        Ok(scan)
    }
}

/// Check that `root` exists and is a directory
pub fn check_root(root: &Path) -> Result<()> {
    match std::fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::PathNotFound {
            path: root.to_path_buf(),
        }),
        Err(e) => Err(Error::read(root, e)),
    }
}
