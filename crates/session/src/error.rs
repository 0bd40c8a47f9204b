use thiserror::Error;

/// Failure talking to the auth backend.
#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered `success: false`.
    #[error("login rejected: {0}")]
    LoginFailed(String),

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AuthApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthApiError::Parse(err.to_string())
        } else {
            AuthApiError::Network(err.to_string())
        }
    }
}

/// Failure reading or writing the persisted session record.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite storage error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Error surfaced by [`crate::SessionStore`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthApiError),

    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),

    /// A newer login/logout/initialize started before this one resolved; its
    /// result was discarded.
    #[error("superseded by a newer session transition")]
    Superseded,
}
