// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite-backed local cache.
//!
//! One row per namespace, holding the serialized collection snapshot:
//!
//! ```sql
//! CREATE TABLE saved_item_cache (
//!   namespace  TEXT PRIMARY KEY,
//!   snapshot   TEXT NOT NULL,    -- JSON array of entries, newest first
//!   updated_at INTEGER NOT NULL  -- epoch millis of last write
//! )
//! ```
//!
//! Snapshots are whole-collection replacements, so a write is a single
//! upsert and a read is a single point lookup. WAL journal mode keeps
//! reads from blocking behind writes.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::traits::{CacheError, LocalCache};
use crate::entry::Collection;

/// Persistent [`LocalCache`] over a local SQLite file.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let url = format!("sqlite://{path_str}?mode=rwc");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .map_err(|e| CacheError::Backend(format!("failed to open cache at {path_str}: {e}")))?;

        let cache = Self { pool };
        cache.enable_wal_mode().await?;
        cache.init_schema().await?;

        info!(path = %path_str, "saved-item cache opened");
        Ok(cache)
    }

    /// Enable WAL journal mode so cache reads don't block behind writes.
    async fn enable_wal_mode(&self) -> Result<(), CacheError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!("failed to enable WAL mode: {e}")))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!("failed to set synchronous mode: {e}")))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_item_cache (
                namespace  TEXT PRIMARY KEY,
                snapshot   TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(format!("failed to create cache schema: {e}")))?;

        Ok(())
    }

    fn now_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

#[async_trait]
impl LocalCache for SqliteCache {
    async fn read(&self, namespace: &str) -> Result<Option<Collection>, CacheError> {
        let row = sqlx::query("SELECT snapshot FROM saved_item_cache WHERE namespace = ?")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Read {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("snapshot").map_err(|e| CacheError::Read {
                    namespace: namespace.to_string(),
                    reason: e.to_string(),
                })?;
                let collection = serde_json::from_str(&raw).map_err(|e| CacheError::Read {
                    namespace: namespace.to_string(),
                    reason: format!("corrupt snapshot: {e}"),
                })?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, namespace: &str, collection: &Collection) -> Result<(), CacheError> {
        let raw = serde_json::to_string(collection).map_err(|e| CacheError::Write {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO saved_item_cache (namespace, snapshot, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(namespace) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(raw)
        .bind(Self::now_ms())
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Write {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    async fn erase(&self, namespace: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM saved_item_cache WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Write {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ItemId, SavedItemEntry};
    use serde_json::json;

    fn test_entry(id: i64, saved_at: i64) -> SavedItemEntry {
        SavedItemEntry::new(ItemId::from(id), json!({"id": id, "title": "Test"}), saved_at)
    }

    async fn open_cache(dir: &tempfile::TempDir) -> SqliteCache {
        SqliteCache::new(dir.path().join("cache.db"))
            .await
            .expect("cache should open")
    }

    #[tokio::test]
    async fn test_read_missing_namespace_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;
        assert!(cache.read("savedItems").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;

        let mut collection = Collection::new();
        collection.insert_front(test_entry(1, 100));
        collection.insert_front(test_entry(2, 200));

        cache.write("savedItems", &collection).await.unwrap();
        let back = cache.read("savedItems").await.unwrap().unwrap();

        assert_eq!(back, collection);
        let ids: Vec<_> = back.ids().map(|id| id.as_str().to_string()).collect();
        assert_eq!(ids, ["2", "1"]);
    }

    #[tokio::test]
    async fn test_write_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;

        let mut first = Collection::new();
        first.insert_front(test_entry(1, 100));
        cache.write("savedItems", &first).await.unwrap();

        let mut second = Collection::new();
        second.insert_front(test_entry(2, 200));
        cache.write("savedItems", &second).await.unwrap();

        let back = cache.read("savedItems").await.unwrap().unwrap();
        assert_eq!(back.len(), 1);
        assert!(back.contains(&ItemId::from(2)));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;

        let mut alice = Collection::new();
        alice.insert_front(test_entry(1, 100));
        cache.write("savedItems_alice", &alice).await.unwrap();

        assert!(cache.read("savedItems_bob").await.unwrap().is_none());
        assert!(cache.read("savedItems").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_erase() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;

        cache.write("savedItems", &Collection::new()).await.unwrap();
        cache.erase("savedItems").await.unwrap();
        assert!(cache.read("savedItems").await.unwrap().is_none());

        // Erasing an absent namespace succeeds
        cache.erase("savedItems").await.unwrap();
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let mut collection = Collection::new();
        collection.insert_front(test_entry(1, 100));

        {
            let cache = SqliteCache::new(&path).await.unwrap();
            cache.write("savedItems", &collection).await.unwrap();
        }

        let reopened = SqliteCache::new(&path).await.unwrap();
        let back = reopened.read("savedItems").await.unwrap().unwrap();
        assert_eq!(back, collection);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir).await;

        sqlx::query(
            "INSERT INTO saved_item_cache (namespace, snapshot, updated_at) VALUES (?, ?, ?)",
        )
        .bind("savedItems")
        .bind("{not valid json")
        .bind(0_i64)
        .execute(&cache.pool)
        .await
        .unwrap();

        assert!(matches!(
            cache.read("savedItems").await,
            Err(CacheError::Read { .. })
        ));
    }
}
