//! In-memory snapshot store

use crate::model::RunSnapshot;
use crate::storage::traits::{validate_key, SnapshotStore, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Snapshot store kept in process memory, ordered by key
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<BTreeMap<String, RunSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn write(&self, key: &str, snapshot: &RunSnapshot) -> StorageResult<()> {
        validate_key(key, snapshot)?;
        let mut snapshots = self.snapshots.lock().map_err(|_| StorageError::Lock)?;
        snapshots.insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<Option<RunSnapshot>> {
        let snapshots = self.snapshots.lock().map_err(|_| StorageError::Lock)?;
        Ok(snapshots.get(key).cloned())
    }

    fn read_latest(&self) -> StorageResult<Option<RunSnapshot>> {
        let snapshots = self.snapshots.lock().map_err(|_| StorageError::Lock)?;
        Ok(snapshots.values().next_back().cloned())
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        let snapshots = self.snapshots.lock().map_err(|_| StorageError::Lock)?;
        Ok(snapshots.keys().cloned().collect())
    }

    fn count(&self) -> StorageResult<u64> {
        let snapshots = self.snapshots.lock().map_err(|_| StorageError::Lock)?;
        Ok(snapshots.len() as u64)
    }
}
