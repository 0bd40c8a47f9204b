//! Durable form of the session: the raw token and the JSON identity, kept
//! under two well-known keys that are always written and cleared together.

use catequesis_auth::Identity;

use crate::error::StorageError;
use crate::state::AccessToken;
use crate::storage::SessionStorage;

/// Key holding the raw bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key holding the JSON-serialized [`Identity`].
pub const USER_DATA_KEY: &str = "user_data";

const KEYS: [&str; 2] = [AUTH_TOKEN_KEY, USER_DATA_KEY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub token: AccessToken,
    pub user: Identity,
}

/// Result of reading the record at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRead {
    Absent,
    Present(PersistedSession),
    /// Something was stored but it cannot be used; the reason is for logs.
    Corrupted(String),
}

impl PersistedSession {
    pub fn new(token: AccessToken, user: Identity) -> Self {
        Self { token, user }
    }

    pub async fn load<S>(storage: &S) -> Result<RecordRead, StorageError>
    where
        S: SessionStorage + ?Sized,
    {
        let token = storage.get(AUTH_TOKEN_KEY).await?;
        let user = storage.get(USER_DATA_KEY).await?;

        let read = match (token, user) {
            (None, None) => RecordRead::Absent,
            (Some(token), Some(user)) => {
                let token = AccessToken::new(token);
                if token.is_empty() {
                    return Ok(RecordRead::Corrupted("stored token is empty".to_string()));
                }
                match serde_json::from_str::<Identity>(&user) {
                    Ok(user) => RecordRead::Present(PersistedSession { token, user }),
                    Err(e) => RecordRead::Corrupted(format!("stored user data is not a valid identity: {e}")),
                }
            }
            (Some(_), None) => RecordRead::Corrupted("token stored without user data".to_string()),
            (None, Some(_)) => RecordRead::Corrupted("user data stored without token".to_string()),
        };

        Ok(read)
    }

    pub async fn save<S>(&self, storage: &S) -> Result<(), StorageError>
    where
        S: SessionStorage + ?Sized,
    {
        let user = serde_json::to_string(&self.user)
            .map_err(|e| StorageError::Unavailable(format!("failed to serialize identity: {e}")))?;

        storage
            .set_all(&[(AUTH_TOKEN_KEY, self.token.as_str()), (USER_DATA_KEY, user.as_str())])
            .await
    }

    pub async fn erase<S>(storage: &S) -> Result<(), StorageError>
    where
        S: SessionStorage + ?Sized,
    {
        storage.remove_all(&KEYS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use catequesis_auth::Role;
    use catequesis_core::UserId;

    fn record() -> PersistedSession {
        PersistedSession::new(
            AccessToken::new("tok-1"),
            Identity {
                id: UserId::new(9),
                username: "ana".to_string(),
                role: Role::Secretaria,
                parish: None,
                active: true,
            },
        )
    }

    #[tokio::test]
    async fn save_then_load() {
        let storage = MemoryStorage::new();
        record().save(&storage).await.unwrap();

        assert_eq!(storage.peek(AUTH_TOKEN_KEY).as_deref(), Some("tok-1"));
        assert_eq!(
            PersistedSession::load(&storage).await.unwrap(),
            RecordRead::Present(record())
        );
    }

    #[tokio::test]
    async fn erase_removes_both_keys() {
        let storage = MemoryStorage::new();
        record().save(&storage).await.unwrap();
        PersistedSession::erase(&storage).await.unwrap();

        assert!(storage.is_empty());
        assert_eq!(PersistedSession::load(&storage).await.unwrap(), RecordRead::Absent);
    }

    #[tokio::test]
    async fn garbage_user_data_is_corrupted() {
        let storage = MemoryStorage::with_entries([(AUTH_TOKEN_KEY, "tok"), (USER_DATA_KEY, "{not json")]);
        assert!(matches!(
            PersistedSession::load(&storage).await.unwrap(),
            RecordRead::Corrupted(_)
        ));
    }

    #[tokio::test]
    async fn half_written_record_is_corrupted() {
        let storage = MemoryStorage::with_entries([(AUTH_TOKEN_KEY, "tok")]);
        assert!(matches!(
            PersistedSession::load(&storage).await.unwrap(),
            RecordRead::Corrupted(_)
        ));
    }
}
