//! Result type alias for MirrorSync operations

use crate::Error;

/// Result type alias for MirrorSync operations
pub type Result<T> = std::result::Result<T, Error>;
