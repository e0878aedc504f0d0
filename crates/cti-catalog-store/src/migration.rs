//! Database schema migrations for SQLite.
//!
//! Versioned, forward-only. Each version is applied inside the same
//! transaction that records it in `schema_migrations`.

use rusqlite::Connection;

use cti_catalog_core::now_millis;

use crate::error::{Result, StoreError};

/// Schema steps, in order. The version of a step is its position plus one.
const MIGRATIONS: &[&str] = &[
    // v1: indices, aliases and documents.
    r#"
    CREATE TABLE indices (
        name TEXT PRIMARY KEY,
        mapping TEXT NOT NULL,            -- JSON mapping, stored verbatim
        created_at INTEGER NOT NULL
    );

    -- At most one concrete index per alias
    CREATE TABLE aliases (
        alias TEXT PRIMARY KEY,
        index_name TEXT NOT NULL REFERENCES indices(name)
    );

    CREATE TABLE documents (
        index_name TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        source TEXT NOT NULL,             -- JSON document source
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (index_name, doc_id)
    );
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Running it again is a no-op.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT IFNULL(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "store was written by schema v{applied}, this build knows up to v{CURRENT_VERSION}"
        )));
    }

    let pending = &MIGRATIONS[applied as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (step, sql) in pending.iter().enumerate() {
        let version = applied + step as u32 + 1;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
    }
    tx.commit()?;
    Ok(())
}
