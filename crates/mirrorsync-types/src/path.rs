//! Normalized relative paths used as the identity key across trees
//!
//! A [`RelativePath`] always uses forward slashes internally, regardless of the
//! platform it was built on, and only turns back into a native path at I/O
//! boundaries. Two paths are the same file iff their normalized strings match.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// A file location relative to a tree root, normalized to `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct RelativePath {
    inner: String,
}

impl RelativePath {
    /// Normalize a relative path.
    ///
    /// `.` components are dropped. Absolute paths, `..` components, empty
    /// paths and names that are not valid UTF-8 are rejected.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut parts: Vec<&str> = Vec::new();

        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| Error::invalid_path(path, "not valid UTF-8"))?;
                    parts.push(name);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(Error::invalid_path(
                        path,
                        "parent directory components are not allowed",
                    ));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::invalid_path(path, "path must be relative"));
                }
            }
        }

        if parts.is_empty() {
            return Err(Error::invalid_path(path, "empty path"));
        }

        Ok(Self {
            inner: parts.join("/"),
        })
    }

    /// Build the key for `full`, a path somewhere beneath `root`.
    pub fn from_root(root: impl AsRef<Path>, full: impl AsRef<Path>) -> Result<Self> {
        let full = full.as_ref();
        let relative = full
            .strip_prefix(root.as_ref())
            .map_err(|_| Error::invalid_path(full, "path is outside of its root"))?;
        Self::new(relative)
    }

    /// Get the normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native relative `PathBuf`.
    pub fn to_native(&self) -> PathBuf {
        self.inner.split('/').collect()
    }

    /// Resolve this path beneath `root`.
    pub fn join_to(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(self.to_native())
    }

    /// Iterate over the `/`-separated components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/')
    }

    /// The parent directory, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<Self> {
        self.inner.rfind('/').map(|idx| Self {
            inner: self.inner[..idx].to_string(),
        })
    }

    /// The final component.
    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or(&self.inner)
    }

    /// Whether `self` is `ancestor` itself or lies beneath it.
    ///
    /// Matching is per component, so `dir2/a` does not start with `dir`.
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        self.inner == ancestor.inner
            || (self.inner.starts_with(&ancestor.inner)
                && self.inner.as_bytes().get(ancestor.inner.len()) == Some(&b'/'))
    }
}

impl std::fmt::Display for RelativePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.inner
    }
}
