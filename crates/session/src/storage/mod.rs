//! Client-scoped key-value storage for the persisted session record.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Durable key-value store scoped to this client installation.
///
/// Multi-key writes and removals are applied as one unit where the backend
/// can do so; the session record relies on this to keep its two keys in step.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError>;
}

#[async_trait]
impl<T> SessionStorage for Arc<T>
where
    T: SessionStorage + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        (**self).set_all(entries).await
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).remove_all(keys).await
    }
}
