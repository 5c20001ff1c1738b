//! Cache key and value definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identity of an input file.
///
/// Keys are stored as the path string the file was discovered under, which
/// keeps the on-disk cache a plain `{ "<path>": "<description>" }` object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    /// Create a key from any string-like identifier.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key interpreted as a filesystem path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FileKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for FileKey {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for FileKey {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

/// Text produced by the captioning service for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    /// Wrap service output as a description.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The description text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single committed cache record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// File the description belongs to.
    pub key: FileKey,
    /// Description text.
    pub description: Description,
}
