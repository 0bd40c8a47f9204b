//! Session lifecycle and route guarding for the catechesis client.
//!
//! [`SessionStore`] owns the signed-in identity and its token, persists them
//! through a [`SessionStorage`] backend and revalidates them against the
//! [`AuthApi`] at start-up. [`RouteGuard`] turns the current session into a
//! render / redirect / deny decision for a protected view.

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod record;
pub mod state;
pub mod storage;
pub mod store;

pub use api::{AuthApi, Credentials, HttpAuthApi, LoginGrant};
pub use config::{ClientConfig, ConfigError};
pub use error::{AuthApiError, SessionError, StorageError};
pub use guard::{AccessDenied, GuardDecision, RouteGuard};
pub use navigation::Navigation;
pub use record::{AUTH_TOKEN_KEY, PersistedSession, RecordRead, USER_DATA_KEY};
pub use state::{AccessToken, LoadingState, Session};
pub use storage::{MemoryStorage, SessionStorage, SqliteStorage};
pub use store::SessionStore;
