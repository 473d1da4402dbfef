//! Named byte-record storage.
//!
//! A record store holds opaque byte blobs keyed by name.  The browser uses a
//! single record for its snapshot, but the store itself knows nothing about
//! what the bytes mean.
//!
//! Two implementations are provided:
//!
//! - [`FileRecordStore`] keeps one file per record in a directory.  Writes go
//!   to a temporary sibling file first and are then renamed over the record,
//!   so a reader never observes a half-written record.
//! - [`MemoryRecordStore`] keeps records in a map and can be told to fail
//!   writes, which lets tests exercise the write-error path.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Error type for record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record name cannot be used as a file name.
    #[error("invalid record name {0:?}")]
    InvalidName(String),

    /// A file system I/O error occurred.
    #[error("I/O error accessing record at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store refused the write.
    #[error("write rejected by store: {0}")]
    Rejected(String),
}

/// Storage for named byte records.
pub trait RecordStore: Send + Sync {
    /// Returns the record's bytes, or `None` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Creates or replaces the record.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Removes the record.  Removing an absent record succeeds.
    fn delete(&self, name: &str) -> Result<(), StoreError>;
}

// ── File-backed store ─────────────────────────────────────────────────────────

/// One file per record inside `dir`.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.ends_with(".tmp");
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.record_path(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.record_path(name)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp = self.dir.join(format!("{name}.tmp"));
        std::fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), len = bytes.len(), "record written");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.record_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Records held in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds one record.
    pub fn with_record(name: &str, bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store.lock().insert(name.to_string(), bytes);
        store
    }

    /// Makes every subsequent write fail with [`StoreError::Rejected`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(name).cloned())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(format!("{name} is read-only")));
        }
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.lock().remove(name);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_store() -> FileRecordStore {
        let dir = std::env::temp_dir().join(format!("btbrowser_test_{}", Uuid::new_v4()));
        FileRecordStore::new(dir)
    }

    #[test]
    fn test_file_store_read_absent_record_returns_none() {
        let store = temp_store();
        assert!(store.read("btbrowser.db").unwrap().is_none());
    }

    #[test]
    fn test_file_store_write_then_read_returns_bytes() {
        // Arrange
        let store = temp_store();

        // Act
        store.write("btbrowser.db", &[1, 2, 3]).unwrap();
        let bytes = store.read("btbrowser.db").unwrap();

        // Assert
        assert_eq!(bytes, Some(vec![1, 2, 3]));
        assert!(!store.dir().join("btbrowser.db.tmp").exists());

        // Cleanup
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_file_store_write_replaces_previous_record() {
        let store = temp_store();
        store.write("r", &[1; 64]).unwrap();
        store.write("r", &[2]).unwrap();
        assert_eq!(store.read("r").unwrap(), Some(vec![2]));
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_file_store_delete_absent_record_succeeds() {
        let store = temp_store();
        store.delete("missing").unwrap();
        assert!(store.read("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_store_delete_removes_record() {
        let store = temp_store();
        store.write("r", &[9]).unwrap();
        store.delete("r").unwrap();
        assert!(store.read("r").unwrap().is_none());
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_file_store_rejects_path_like_names() {
        let store = temp_store();
        for name in ["", ".", "..", "a/b", "a\\b", "x.tmp"] {
            assert!(
                matches!(store.read(name), Err(StoreError::InvalidName(_))),
                "{name:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_memory_store_fail_writes_keeps_old_record() {
        let store = MemoryRecordStore::with_record("r", vec![1]);
        store.set_fail_writes(true);

        let result = store.write("r", &[2]);

        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert_eq!(store.read("r").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_memory_store_delete_is_idempotent() {
        let store = MemoryRecordStore::with_record("r", vec![1]);
        store.delete("r").unwrap();
        store.delete("r").unwrap();
        assert!(!store.contains("r"));
    }
}
