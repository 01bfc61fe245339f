//! MirrorSync Testing Suite
//!
//! Integration tests and benchmarks for the MirrorSync workspace, plus the
//! fixtures they share.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Source/replica tree fixtures, tree snapshots and a recording reporter used
/// by the integration tests and the benchmarks.
pub mod test_utils;
