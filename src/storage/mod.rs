//! Storage module for persisting run snapshots
//!
//! This module handles snapshot persistence, including:
//! - The `SnapshotStore` contract the pipeline writes through
//! - A SQLite document store keyed by run timestamp
//! - An in-memory store for embedding and tests

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;
pub use traits::{validate_key, SnapshotStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the snapshot database at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteSnapshotStore> {
    SqliteSnapshotStore::new(path)
}
