//! Storage traits and error types
//!
//! This module defines the snapshot store contract the pipeline depends on
//! and the associated error types.

use crate::model::RunSnapshot;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot key is not an ISO-8601 timestamp: {0}")]
    InvalidKey(String),

    #[error("Snapshot key {key} does not match snapshot timestamp {timestamp}")]
    KeyMismatch { key: String, timestamp: String },

    #[error("Store lock poisoned")]
    Lock,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-path document store for run snapshots
///
/// Keys are ISO-8601 UTC timestamps. Writes are upserts, so writing the same
/// snapshot twice under one key leaves a single entry. Implementations must
/// be shareable across tasks.
pub trait SnapshotStore: Send + Sync {
    /// Inserts or replaces the snapshot stored under `key`
    fn write(&self, key: &str, snapshot: &RunSnapshot) -> StorageResult<()>;

    /// Reads the snapshot stored under `key`
    fn read(&self, key: &str) -> StorageResult<Option<RunSnapshot>>;

    /// Reads the snapshot with the most recent key
    fn read_latest(&self) -> StorageResult<Option<RunSnapshot>>;

    /// Lists all keys, oldest first
    fn list_keys(&self) -> StorageResult<Vec<String>>;

    /// Counts stored snapshots
    fn count(&self) -> StorageResult<u64>;
}

/// Checks that a key is an RFC 3339 timestamp matching the snapshot it names
pub fn validate_key(key: &str, snapshot: &RunSnapshot) -> StorageResult<()> {
    chrono::DateTime::parse_from_rfc3339(key)
        .map_err(|_| StorageError::InvalidKey(key.to_string()))?;

    if key != snapshot.timestamp {
        return Err(StorageError::KeyMismatch {
            key: key.to_string(),
            timestamp: snapshot.timestamp.clone(),
        });
    }

    Ok(())
}
