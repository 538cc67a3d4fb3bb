//! Database schema definitions
//!
//! The snapshot database is a single document table keyed by run timestamp.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per scrape run, the full snapshot stored as a JSON document
CREATE TABLE IF NOT EXISTS snapshots (
    key TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    site_count INTEGER NOT NULL,
    tender_count INTEGER NOT NULL,
    config_hash TEXT,
    written_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
