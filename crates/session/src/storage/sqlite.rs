//! SQLite-backed session storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use super::SessionStorage;
use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Key-value table in a local SQLite database.
///
/// The connection is opened lazily on first use. Multi-key writes run in a
/// single transaction, so the token and the identity are always stored or
/// removed together.
#[derive(Debug)]
pub struct SqliteStorage {
    location: Location,
    pool: Mutex<Option<SqlitePool>>,
}

impl SqliteStorage {
    /// Storage in the database file at `path` (created on first use).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            pool: Mutex::new(None),
        }
    }

    /// Private in-memory database (lives as long as this value).
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Get the pool, initializing if necessary.
    async fn pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let options = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                SqliteConnectOptions::new().filename(path).create_if_missing(true)
            }
            Location::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        // One connection: an in-memory database only exists on the connection
        // that created it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!(location = ?self.location, "session storage opened");

        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl SessionStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pool = self.pool().await?;

        let row = sqlx::query("SELECT value FROM session_kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO session_kv (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(*key)
            .bind(*value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        for key in keys {
            sqlx::query("DELETE FROM session_kv WHERE key = ?1")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Default database location: `{app_data_dir}/catequesis/session.db`.
///
/// Returns `None` when neither the OS data directory nor a home directory can
/// be resolved.
pub fn default_session_db_path() -> Option<PathBuf> {
    let mut dir = dirs::data_dir().or_else(|| {
        dirs::home_dir().map(|mut h| {
            h.push(".local");
            h.push("share");
            h
        })
    })?;

    dir.push("catequesis");
    dir.push("session.db");
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let storage = SqliteStorage::in_memory();

        assert_eq!(storage.get("auth_token").await.unwrap(), None);

        storage
            .set_all(&[("auth_token", "abc"), ("user_data", "{}")])
            .await
            .unwrap();
        assert_eq!(storage.get("auth_token").await.unwrap().as_deref(), Some("abc"));

        storage.set_all(&[("auth_token", "def")]).await.unwrap();
        assert_eq!(storage.get("auth_token").await.unwrap().as_deref(), Some("def"));
        assert_eq!(storage.get("user_data").await.unwrap().as_deref(), Some("{}"));

        storage.remove_all(&["auth_token", "user_data"]).await.unwrap();
        assert_eq!(storage.get("auth_token").await.unwrap(), None);
        assert_eq!(storage.get("user_data").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("catequesis-session-test-{}", std::process::id()));
        let path = dir.join("nested").join("session.db");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let storage = SqliteStorage::open(&path);
            storage.set_all(&[("auth_token", "persisted")]).await.unwrap();
        }

        let reopened = SqliteStorage::open(&path);
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(reopened.get("auth_token").await.unwrap().as_deref(), Some("persisted"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_path_ends_with_app_folder() {
        if let Some(path) = default_session_db_path() {
            assert!(path.ends_with("catequesis/session.db"));
        }
    }
}
