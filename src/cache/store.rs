//! JSON-file backed description store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;

use super::entry::{CacheEntry, Description, FileKey};

/// Errors that can occur while committing to the description store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Failed to create or write the temporary cache file.
    #[error("I/O error writing cache {path}: {source}")]
    Io {
        /// Cache file being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The cache file exists but does not hold a JSON object of strings.
    #[error("Malformed description cache {path}: {source}")]
    Load {
        /// Cache file being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Failed to encode the mapping.
    #[error("Failed to serialize description cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to rename the temporary file over the cache file.
    #[error("Failed to replace cache file {path}: {source}")]
    Persist {
        /// Cache file being replaced
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable mapping from [`FileKey`] to [`Description`].
///
/// All mutations take the same lock for the in-memory update *and* the flush,
/// so there is exactly one writer at a time. A `put` whose flush fails is
/// rolled back in memory, which means the key is fetched again on the next
/// batch instead of being served from a cache that never reached disk.
#[derive(Debug)]
pub struct DescriptionStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<FileKey, Description>>,
}

impl DescriptionStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or malformed file is
    /// logged and also yields an empty store; the next successful `put`
    /// replaces it.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => {
                log::debug!(
                    "Loaded {} cached descriptions from {}",
                    entries.len(),
                    path.display()
                );
                entries
            }
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable description cache {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// Create a store that lives only in memory. Flushes are no-ops.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn load(path: &Path) -> StoreResult<BTreeMap<FileKey, Description>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Load {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Path of the durable file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up the description for `key`.
    #[must_use]
    pub fn get(&self, key: &FileKey) -> Option<Description> {
        self.lock().get(key).cloned()
    }

    /// Whether `key` has a committed description.
    #[must_use]
    pub fn contains(&self, key: &FileKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all committed entries, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.lock()
            .iter()
            .map(|(key, description)| CacheEntry {
                key: key.clone(),
                description: description.clone(),
            })
            .collect()
    }

    /// Commit `description` for `key` and flush the whole mapping.
    ///
    /// Writing the same text that is already stored skips the flush.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the mapping could not be persisted. The
    /// in-memory state is left exactly as it was before the call.
    pub fn put(&self, key: FileKey, description: Description) -> StoreResult<()> {
        let mut entries = self.lock();

        if entries.get(&key) == Some(&description) {
            log::trace!("Cache already holds description for {}", key);
            return Ok(());
        }

        let previous = entries.insert(key.clone(), description);
        if let Err(e) = self.flush(&entries) {
            match previous {
                Some(old) => entries.insert(key, old),
                None => entries.remove(&key),
            };
            return Err(e);
        }

        log::trace!("Committed description for {}", key);
        Ok(())
    }

    /// Remove every entry and persist the empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the empty mapping could not be persisted, in
    /// which case nothing is removed.
    pub fn clear(&self) -> StoreResult<()> {
        let mut entries = self.lock();
        let empty = BTreeMap::new();
        self.flush(&empty)?;
        *entries = empty;
        Ok(())
    }

    /// Write `entries` to a temp file beside the target and rename it in place.
    fn flush(&self, entries: &BTreeMap<FileKey, Description>) -> StoreResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(entries)?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(parent).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| StoreError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        sync_dir(parent).map_err(io_err)?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<FileKey, Description>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Flush the directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_reports_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = DescriptionStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Load { .. }));
        assert!(err.to_string().contains("cache.json"));
    }

    #[test]
    fn test_load_unreadable_path_is_io_error() {
        let dir = tempdir().unwrap();
        // Reading a directory as a file fails on every platform.
        let err = DescriptionStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_flush_syncs_parent_directory() {
        let dir = tempdir().unwrap();
        sync_dir(dir.path()).unwrap();

        let path = dir.path().join("fresh").join("cache.json");
        let store = DescriptionStore::open(&path);
        store
            .put(FileKey::from("a.png"), Description::new("durable"))
            .unwrap();
        assert_eq!(DescriptionStore::open(&path).len(), 1);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = DescriptionStore::open(dir.path().join("cache.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = DescriptionStore::in_memory();
        let key = FileKey::from("a.png");
        store.put(key.clone(), Description::new("a red dragon")).unwrap();
        assert_eq!(store.get(&key), Some(Description::new("a red dragon")));
        assert!(store.contains(&key));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_persists_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        {
            let store = DescriptionStore::open(&path);
            store
                .put(FileKey::from("a.png"), Description::new("a red dragon"))
                .unwrap();
        }
        let reopened = DescriptionStore::open(&path);
        assert_eq!(
            reopened.get(&FileKey::from("a.png")),
            Some(Description::new("a red dragon"))
        );
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let store = DescriptionStore::open(&path);
        assert!(store.is_empty());

        // The next put replaces the corrupt file with a valid one.
        store.put(FileKey::from("x"), Description::new("y")).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.get("x").map(String::as_str), Some("y"));
    }

    #[test]
    fn test_reads_legacy_flat_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptions_cache.json");
        fs::write(
            &path,
            r#"{"./data/a.png": "a red dragon", "./data/b.png": "a blue bird"}"#,
        )
        .unwrap();

        let store = DescriptionStore::open(&path);
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&FileKey::from("./data/b.png")),
            Some(Description::new("a blue bird"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_flush_rolls_back() {
        let dir = tempdir().unwrap();
        // A directory in place of the target makes the rename fail.
        let path = dir.path().join("cache.json");
        fs::create_dir(&path).unwrap();

        let store = DescriptionStore::open(&path);
        let result = store.put(FileKey::from("a.png"), Description::new("d"));
        assert!(result.is_err());
        assert!(!store.contains(&FileKey::from("a.png")));
    }

    #[test]
    fn test_clear_persists_empty_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = DescriptionStore::open(&path);
        store.put(FileKey::from("a"), Description::new("b")).unwrap();

        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(DescriptionStore::open(&path).is_empty());
    }

    #[test]
    fn test_snapshot_is_key_ordered() {
        let store = DescriptionStore::in_memory();
        store.put(FileKey::from("b"), Description::new("2")).unwrap();
        store.put(FileKey::from("a"), Description::new("1")).unwrap();
        let keys: Vec<_> = store.snapshot().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![FileKey::from("a"), FileKey::from("b")]);
    }
}
