//! SQLite storage implementation
//!
//! This module provides a SQLite-backed document store for run snapshots.

use crate::model::RunSnapshot;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{validate_key, SnapshotStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite snapshot store
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    config_hash: Option<String>,
}

impl SqliteSnapshotStore {
    /// Opens or creates the snapshot database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config_hash: None,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config_hash: None,
        })
    }

    /// Tags every snapshot written through this store with a config hash
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Returns the config hash a snapshot was written under
    pub fn config_hash_of(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let hash = conn
            .query_row(
                "SELECT config_hash FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }
}

fn decode(document: Option<String>) -> StorageResult<Option<RunSnapshot>> {
    document
        .map(|doc| serde_json::from_str(&doc).map_err(StorageError::from))
        .transpose()
}

impl SnapshotStore for SqliteSnapshotStore {
    fn write(&self, key: &str, snapshot: &RunSnapshot) -> StorageResult<()> {
        validate_key(key, snapshot)?;
        let document = serde_json::to_string(snapshot)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (key, document, site_count, tender_count, config_hash, written_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET
                document = excluded.document,
                site_count = excluded.site_count,
                tender_count = excluded.tender_count,
                config_hash = excluded.config_hash,
                written_at = excluded.written_at",
            params![
                key,
                document,
                snapshot.sites.len() as i64,
                snapshot.tender_count() as i64,
                self.config_hash,
                now
            ],
        )?;

        tracing::debug!(
            "Wrote snapshot {} ({} sites, {} tenders)",
            key,
            snapshot.sites.len(),
            snapshot.tender_count()
        );
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<Option<RunSnapshot>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        decode(document)
    }

    fn read_latest(&self) -> StorageResult<Option<RunSnapshot>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document FROM snapshots ORDER BY key DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        decode(document)
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM snapshots ORDER BY key ASC")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
