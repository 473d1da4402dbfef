//! SnapshotRepository: the registry snapshot on top of a [`RecordStore`].

use std::sync::Arc;

use bt_browser_core::{decode_snapshot, encode_snapshot, Registry, SnapshotError};
use thiserror::Error;
use tracing::{debug, info};

use super::record_store::{RecordStore, StoreError};

/// Error returned by [`SnapshotRepository::load`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// The record exists but does not parse as a snapshot.
    #[error("snapshot corrupted: {0}")]
    Corrupted(#[from] SnapshotError),

    /// The record could not be read at all.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error returned by [`SnapshotRepository::save`].
#[derive(Debug, Error)]
pub enum SaveError {
    /// The registry cannot be represented in the snapshot format.
    #[error("cannot encode snapshot: {0}")]
    Encode(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Loads, saves, and deletes the single named snapshot record.
#[derive(Clone)]
pub struct SnapshotRepository {
    store: Arc<dyn RecordStore>,
    record_name: String,
}

impl SnapshotRepository {
    pub fn new(store: Arc<dyn RecordStore>, record_name: impl Into<String>) -> Self {
        Self {
            store,
            record_name: record_name.into(),
        }
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Reads the snapshot.  `Ok(None)` means no snapshot has been saved yet.
    ///
    /// # Errors
    ///
    /// [`LoadError::Corrupted`] if the record does not parse completely,
    /// [`LoadError::Store`] if it could not be read.
    pub fn load(&self) -> Result<Option<Registry>, LoadError> {
        let Some(bytes) = self.store.read(&self.record_name)? else {
            debug!(record = %self.record_name, "no snapshot record");
            return Ok(None);
        };
        let registry = decode_snapshot(&bytes)?;
        info!(
            record = %self.record_name,
            devices = registry.len(),
            services = registry.total_service_count(),
            "snapshot loaded"
        );
        Ok(Some(registry))
    }

    /// Replaces the stored snapshot with `registry`.
    ///
    /// # Errors
    ///
    /// [`SaveError::Encode`] if a name is too long for the format,
    /// [`SaveError::Store`] if the write failed.  The previous snapshot is
    /// left in place on error.
    pub fn save(&self, registry: &Registry) -> Result<(), SaveError> {
        let bytes = encode_snapshot(registry)?;
        self.store.write(&self.record_name, &bytes)?;
        info!(record = %self.record_name, bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Removes the stored snapshot.  Succeeds if there is none.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the record exists but cannot be removed.
    pub fn delete(&self) -> Result<(), StoreError> {
        self.store.delete(&self.record_name)?;
        info!(record = %self.record_name, "snapshot deleted");
        Ok(())
    }
}
