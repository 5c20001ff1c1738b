//! Input file discovery.
//!
//! Lists the files in a data directory whose extension is in an allow-list
//! (case-insensitive). By default only the directory itself is read; the
//! recursive mode descends into subdirectories.
//!
//! # Example
//!
//! ```no_run
//! use capsearch::scanner::{collect_inputs, ScanConfig};
//! use std::path::Path;
//!
//! let keys = collect_inputs(Path::new("./data"), &ScanConfig::default()).unwrap();
//! for key in keys {
//!     println!("{}", key);
//! }
//! ```

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::FileKey;

/// Extensions accepted when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Configuration for input discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Accepted extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Follow symbolic links while descending.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            recursive: false,
            follow_symlinks: false,
        }
    }
}

impl ScanConfig {
    /// Whether `path` has an accepted extension.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Errors that can occur during input discovery.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The data directory does not exist.
    #[error("Folder not found: {0}")]
    NotFound(PathBuf),

    /// The data path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while listing the directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying error
        #[source]
        source: walkdir::Error,
    },
}

/// Collect accepted files under `dir` as sorted [`FileKey`]s.
///
/// Unreadable entries below the root are logged and skipped.
///
/// # Errors
///
/// Returns [`ScanError`] if `dir` is missing, not a directory, or cannot be
/// listed at all.
pub fn collect_inputs(dir: &Path, config: &ScanConfig) -> Result<Vec<FileKey>, ScanError> {
    if !dir.exists() {
        return Err(ScanError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if config.recursive { usize::MAX } else { 1 })
        .follow_links(config.follow_symlinks);

    let mut keys = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(ScanError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        if config.accepts(entry.path()) {
            keys.push(FileKey::from(entry.path()));
        } else {
            log::trace!("Skipping {}: extension not accepted", entry.path().display());
        }
    }

    keys.sort();
    log::debug!("Found {} input files in {}", keys.len(), dir.display());
    Ok(keys)
}
