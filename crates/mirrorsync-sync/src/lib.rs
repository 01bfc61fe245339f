//! One-way directory mirroring engine for MirrorSync
//!
//! This crate makes a replica directory tree converge on a source tree:
//!
//! - **Enumeration**: walk both trees into sets of normalized relative paths
//! - **Classification**: split them into files to create, compare and delete
//! - **Change detection**: compare common files by content fingerprint
//! - **Application**: copy, overwrite and delete, appending each change to the
//!   sync log
//! - **Scheduling**: repeat the pass on a fixed interval until shut down
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_sync::{SyncEngine, SyncOptions, SyncRequest};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::new(SyncOptions::default());
//! let request = SyncRequest::new("source_dir", "replica_dir", "sync.log");
//! let report = engine.synchronize(&request)?;
//! println!(
//!     "{} created, {} modified, {} deleted",
//!     report.stats.files_created, report.stats.files_modified, report.stats.files_deleted
//! );
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod apply;
pub mod classify;
pub mod engine;
pub mod fingerprint;
pub mod journal;
pub mod reporter;
pub mod scan;
pub mod scheduler;

pub use apply::{Applied, GroupOutcome, PruneOutcome, SyncApplier};
pub use classify::{classify, classify_with_exclusions};
pub use engine::{SyncEngine, SyncOptions, SyncRequest};
pub use fingerprint::{fingerprint_bytes, ChangeDetector};
pub use journal::{format_header, SyncJournal};
pub use reporter::TracingReporter;
pub use scan::{TreeEnumerator, TreeScan};
pub use scheduler::{PeriodicSync, SchedulerSummary, ShutdownHandle};
