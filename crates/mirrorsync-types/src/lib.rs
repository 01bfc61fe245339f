//! Core data model and error handling for MirrorSync
//!
//! This crate provides the types shared by every MirrorSync crate:
//!
//! - **Paths**: [`RelativePath`], the normalized key that identifies a file in
//!   both the source and the replica tree
//! - **Pass data**: [`FileSet`], [`ClassificationResult`], [`ContentFingerprint`],
//!   [`LogEntry`] and [`PassReport`]
//! - **Errors**: a single [`Error`] enum separating pass-aborting failures from
//!   per-file ones
//! - **Traits**: [`SyncReporter`] for surfacing progress and failures
//! - **Configuration values**: validated newtypes such as [`WorkerCount`]
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use mirrorsync_types::{FileSet, RelativePath, Result};
//!
//! fn example() -> Result<FileSet> {
//!     let mut files = FileSet::new();
//!     files.insert(RelativePath::new("dir/b.txt")?);
//!     Ok(files)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod path;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BufferSize, FingerprintAlgorithm, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use path::RelativePath;
pub use result::Result;
pub use traits::*;
pub use types::*;
