//! Error types and handling for MirrorSync
//!
//! Errors fall into two groups. Root-level setup failures (a missing source
//! root, an unusable log file) abort a pass before anything is mutated. Per-file
//! failures (read, write, delete) are recorded against a single path and the
//! pass carries on with the rest of the tree.

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the affected path is skipped, the pass continues
    Low,
    /// Medium severity - the pass continues but an operation is left unrecorded
    Medium,
    /// High severity - the pass must be aborted
    High,
    /// Critical severity - the process should be terminated
    Critical,
}

/// Main error type for MirrorSync operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// A configured root does not exist
    #[error("Path not found: {path}")]
    PathNotFound {
        /// Path that does not exist
        path: PathBuf,
    },

    /// A configured root exists but is not a directory
    #[error("Not a directory: {path}")]
    NotADirectory {
        /// Path that is not a directory
        path: PathBuf,
    },

    /// The sync log could not be opened or created
    #[error("Couldn't open or create the log file '{path}': {message}")]
    LogOpen {
        /// Path to the log file
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// A file could not be read while hashing or copying
    #[error("Failed to read '{path}': {message}")]
    Read {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// A replica file could not be written
    #[error("Failed to write '{path}': {message}")]
    Write {
        /// Path that could not be written
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// A replica file or directory could not be removed
    #[error("Couldn't delete '{path}': {message}")]
    Delete {
        /// Path that could not be removed
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Appending to an already opened sync log failed
    #[error("Failed to append to sync log: {message}")]
    Journal {
        /// Underlying error message
        message: String,
    },

    /// A path could not be turned into a relative path key
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// Lossy rendering of the offending path
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O error outside of a specific file operation
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source or replica root is unusable
    Root,
    /// Sync log errors
    Journal,
    /// Per-file read errors
    Read,
    /// Per-file write errors
    Write,
    /// Per-file delete errors
    Delete,
    /// Path normalization errors
    Path,
    /// Configuration errors
    Config,
    /// Other I/O errors
    Io,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathNotFound { .. } | Self::NotADirectory { .. } => ErrorKind::Root,
            Self::LogOpen { .. } | Self::Journal { .. } => ErrorKind::Journal,
            Self::Read { .. } => ErrorKind::Read,
            Self::Write { .. } => ErrorKind::Write,
            Self::Delete { .. } => ErrorKind::Delete,
            Self::InvalidPath { .. } => ErrorKind::Path,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::PathNotFound { .. } | Self::NotADirectory { .. } | Self::LogOpen { .. } => {
                ErrorSeverity::High
            }
            Self::Config { .. } => ErrorSeverity::High,
            Self::Read { .. } | Self::Write { .. } | Self::Delete { .. } => ErrorSeverity::Low,
            Self::InvalidPath { .. } => ErrorSeverity::Low,
            Self::Journal { .. } => ErrorSeverity::Medium,
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Whether this error aborts the whole pass rather than a single path
    pub fn is_fatal(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    /// The filesystem path this error refers to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PathNotFound { path }
            | Self::NotADirectory { path }
            | Self::LogOpen { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Delete { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Create a new read error
    pub fn read(path: impl AsRef<Path>, cause: impl Display) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            message: cause.to_string(),
        }
    }

    /// Create a new write error
    pub fn write(path: impl AsRef<Path>, cause: impl Display) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            message: cause.to_string(),
        }
    }

    /// Create a new delete error
    pub fn delete(path: impl AsRef<Path>, cause: impl Display) -> Self {
        Self::Delete {
            path: path.as_ref().to_path_buf(),
            message: cause.to_string(),
        }
    }

    /// Create a new log-open error
    pub fn log_open(path: impl AsRef<Path>, cause: impl Display) -> Self {
        Self::LogOpen {
            path: path.as_ref().to_path_buf(),
            message: cause.to_string(),
        }
    }

    /// Create a new journal append error
    pub fn journal(cause: impl Display) -> Self {
        Self::Journal {
            message: cause.to_string(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.as_ref().to_string_lossy().into_owned(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
