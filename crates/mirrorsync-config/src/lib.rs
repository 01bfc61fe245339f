//! Configuration management system for MirrorSync
//!
//! Settings are layered: built-in defaults, then an optional YAML, TOML or
//! JSON file, then environment variables prefixed with `MIRRORSYNC` (nested
//! keys separated by `__`, e.g. `MIRRORSYNC__SYNC__WORKERS=4`).
//!
//! The source, replica, interval and log file of a mirror are not part of this
//! configuration; they are given on the command line.
//!
//! # Examples
//!
//! ```rust
//! use mirrorsync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("mirrorsync.yaml")
//!     .add_env_prefix("MIRRORSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Fingerprint: {}", config.sync.fingerprint);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use mirrorsync_types::{BufferSize, FingerprintAlgorithm, WorkerCount};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Environment variable prefix read by [`ConfigLoader`]
pub const ENV_PREFIX: &str = "MIRRORSYNC";

/// Main configuration structure for MirrorSync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Synchronization behaviour
    #[serde(default)]
    pub sync: SyncSettings,
    /// Diagnostics logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Digest used to compare files present in both trees
    pub fingerprint: FingerprintAlgorithm,
    /// Descend into symbolic links while walking the source tree
    pub follow_symlinks: bool,
    /// Create a missing replica root instead of failing the pass
    pub create_replica: bool,
    /// Remove replica directories emptied by deletions
    pub prune_empty_dirs: bool,
    /// Threads used to apply copies and deletions
    pub workers: WorkerCount,
    /// Read buffer used while fingerprinting
    pub buffer_size: BufferSize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintAlgorithm::Blake3,
            follow_symlinks: false,
            create_replica: true,
            prune_empty_dirs: true,
            workers: WorkerCount::sequential(),
            buffer_size: BufferSize::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
    /// Also write diagnostics to this file, rotated daily
    pub diagnostics_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            colored_output: true,
            diagnostics_file: None,
        }
    }
}
