//! SQLite implementation of the DocumentStore trait.
//!
//! This is the persistent backend used by the sync daemon. It uses rusqlite
//! with bundled SQLite, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use cti_catalog_core::now_millis;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CreateIndexResult, DocumentStore, Hit, InsertResult, Query};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations run on the blocking pool.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its parent directory) and runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Resolve an alias to its concrete index; plain names pass through.
fn resolve(conn: &Connection, name: &str) -> Result<String> {
    let target: Option<String> = conn
        .query_row(
            "SELECT index_name FROM aliases WHERE alias = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(target.unwrap_or_else(|| name.to_owned()))
}

/// Resolve a write target, creating the index with an empty mapping if needed.
fn resolve_for_write(conn: &Connection, name: &str) -> Result<String> {
    let concrete = resolve(conn, name)?;
    conn.execute(
        "INSERT OR IGNORE INTO indices (name, mapping, created_at) VALUES (?1, '{}', ?2)",
        params![concrete, now_millis()],
    )?;
    Ok(concrete)
}

fn upsert(conn: &Connection, index: &str, id: &str, source: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO documents (index_name, doc_id, source, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(index_name, doc_id) DO UPDATE SET
            source = excluded.source,
            updated_at = excluded.updated_at",
        params![index, id, source, now_millis()],
    )?;
    Ok(())
}

fn parse_source(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| StoreError::InvalidData(format!("stored source: {}", e)))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let index = index.to_owned();
        self.run(move |conn| {
            let concrete = resolve(conn, &index)?;
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM indices WHERE name = ?1)",
                params![concrete],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
        alias: Option<&str>,
    ) -> Result<CreateIndexResult> {
        let index = index.to_owned();
        let alias = alias.map(str::to_owned);
        let mapping = serde_json::to_string(mapping)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM indices WHERE name = ?1)",
                params![index],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(CreateIndexResult::AlreadyExists);
            }

            if let Some(alias) = &alias {
                let collides: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM indices WHERE name = ?1)",
                    params![alias],
                    |row| row.get(0),
                )?;
                if collides {
                    return Err(StoreError::IndexCreationFailed {
                        index: index.clone(),
                        reason: format!("alias {} collides with an index", alias),
                    });
                }
            }

            tx.execute(
                "INSERT INTO indices (name, mapping, created_at) VALUES (?1, ?2, ?3)",
                params![index, mapping, now_millis()],
            )?;
            if let Some(alias) = &alias {
                tx.execute(
                    "INSERT OR REPLACE INTO aliases (alias, index_name) VALUES (?1, ?2)",
                    params![alias, index],
                )?;
            }
            tx.commit()?;
            Ok(CreateIndexResult::Created)
        })
        .await
    }

    async fn refresh(&self, _indices: &[String]) -> Result<()> {
        // Committed rows are already visible to readers.
        Ok(())
    }

    async fn clear(&self, index: &str) -> Result<u64> {
        let index = index.to_owned();
        self.run(move |conn| {
            let concrete = resolve(conn, &index)?;
            let removed = conn.execute(
                "DELETE FROM documents WHERE index_name = ?1",
                params![concrete],
            )?;
            Ok(removed as u64)
        })
        .await
    }

    async fn put(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        let index = index.to_owned();
        let id = id.to_owned();
        let source = serde_json::to_string(source)?;
        self.run(move |conn| {
            let concrete = resolve_for_write(conn, &index)?;
            upsert(conn, &concrete, &id, &source)
        })
        .await
    }

    async fn put_if_absent(&self, index: &str, id: &str, source: &Value) -> Result<InsertResult> {
        let index = index.to_owned();
        let id = id.to_owned();
        let source = serde_json::to_string(source)?;
        self.run(move |conn| {
            let concrete = resolve_for_write(conn, &index)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO documents (index_name, doc_id, source, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![concrete, id, source, now_millis()],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let index = index.to_owned();
        let id = id.to_owned();
        self.run(move |conn| {
            let concrete = resolve(conn, &index)?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT source FROM documents WHERE index_name = ?1 AND doc_id = ?2",
                    params![concrete, id],
                    |row| row.get(0),
                )
                .optional()?;
            raw.as_deref().map(parse_source).transpose()
        })
        .await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool> {
        let index = index.to_owned();
        let id = id.to_owned();
        self.run(move |conn| {
            let concrete = resolve(conn, &index)?;
            let removed = conn.execute(
                "DELETE FROM documents WHERE index_name = ?1 AND doc_id = ?2",
                params![concrete, id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn bulk_put(&self, index: &str, docs: &[(String, Value)]) -> Result<()> {
        let index = index.to_owned();
        let rows = docs
            .iter()
            .map(|(id, source)| Ok((id.clone(), serde_json::to_string(source)?)))
            .collect::<Result<Vec<_>>>()?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let concrete = resolve_for_write(&tx, &index)?;
            for (id, source) in &rows {
                upsert(&tx, &concrete, id, source)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn search(&self, index: &str, query: &Query, size: usize) -> Result<Vec<Hit>> {
        let index = index.to_owned();
        let query = query.clone();
        self.run(move |conn| {
            let concrete = resolve(conn, &index)?;
            let mut stmt = conn.prepare(
                "SELECT doc_id, source FROM documents WHERE index_name = ?1 ORDER BY doc_id",
            )?;
            let rows = stmt.query_map(params![concrete], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                if hits.len() >= size {
                    break;
                }
                let (id, raw) = row?;
                let source = parse_source(&raw)?;
                if query.matches(&source) {
                    hits.push(Hit { id, source });
                }
            }
            Ok(hits)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let source = json!({"document": {"id": "r1", "title": "t"}, "space": {"name": "standard"}});

        store.put(".rules", "r1", &source).await.unwrap();
        assert_eq!(store.get(".rules", "r1").await.unwrap(), Some(source));
        assert!(store.index_exists(".rules").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(".i", "x", &json!({"v": 1})).await.unwrap();
        store.put(".i", "x", &json!({"v": 2})).await.unwrap();
        assert_eq!(store.get(".i", "x").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(
            store.put_if_absent(".l", "k", &json!(1)).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.put_if_absent(".l", "k", &json!(2)).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(store.get(".l", "k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_alias_and_mapping() {
        let store = SqliteStore::open_memory().unwrap();
        let mapping = json!({"properties": {"document": {"type": "object"}}});

        let first = store
            .create_index(".ctx-d-decoder", &mapping, Some(".cti-decoders"))
            .await
            .unwrap();
        let second = store
            .create_index(".ctx-d-decoder", &mapping, Some(".cti-decoders"))
            .await
            .unwrap();
        assert_eq!(first, CreateIndexResult::Created);
        assert_eq!(second, CreateIndexResult::AlreadyExists);

        store.put(".cti-decoders", "d1", &json!({})).await.unwrap();
        assert!(store.get(".ctx-d-decoder", "d1").await.unwrap().is_some());
        assert!(store.delete(".cti-decoders", "d1").await.unwrap());
    }

    #[tokio::test]
    async fn test_alias_collision_fails() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(".taken", "x", &json!({})).await.unwrap();
        let err = store.create_index(".new", &json!({}), Some(".taken")).await;
        assert!(matches!(err, Err(StoreError::IndexCreationFailed { .. })));
    }

    #[tokio::test]
    async fn test_bulk_search_clear() {
        let store = SqliteStore::open_memory().unwrap();
        let docs: Vec<(String, Value)> = (0..10)
            .map(|i| {
                let space = if i < 3 { "draft" } else { "standard" };
                (format!("p{:02}", i), json!({"space": {"name": space}}))
            })
            .collect();
        store.bulk_put(".p", &docs).await.unwrap();

        let drafts = store
            .search(".p", &Query::term("space.name", "draft"), 100)
            .await
            .unwrap();
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].id, "p00");

        let capped = store.search(".p", &Query::MatchAll, 4).await.unwrap();
        assert_eq!(capped.len(), 4);

        assert_eq!(store.clear(".p").await.unwrap(), 10);
        assert!(store.search(".p", &Query::MatchAll, 100).await.unwrap().is_empty());
        assert!(store.index_exists(".p").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("catalog.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(".c", "k", &json!({"local_offset": 7})).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get(".c", "k").await.unwrap(),
            Some(json!({"local_offset": 7}))
        );
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

        /// Both stores agree on what a batch of writes leaves behind.
        #[test]
        fn matches_memory_store(
            batch in proptest::collection::vec(("[a-d]{1,2}", 0..100i64), 0..20),
        ) {
            use crate::memory::MemoryStore;

            let docs: Vec<(String, Value)> = batch
                .into_iter()
                .map(|(id, n)| (id, json!({"n": n})))
                .collect();
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (sqlite, memory) = rt.block_on(async {
                let sqlite = SqliteStore::open_memory().unwrap();
                let memory = MemoryStore::new();
                sqlite.bulk_put(".idx", &docs).await.unwrap();
                memory.bulk_put(".idx", &docs).await.unwrap();
                (
                    sqlite.search(".idx", &Query::MatchAll, 100).await.unwrap(),
                    memory.search(".idx", &Query::MatchAll, 100).await.unwrap(),
                )
            });
            proptest::prop_assert_eq!(sqlite, memory);
        }
    }
}
