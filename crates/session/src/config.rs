//! Client configuration (environment-driven).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::storage::sqlite::default_session_db_path;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("could not resolve an app data directory; set CATEQUESIS_SESSION_DB")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend API, without trailing slash.
    pub api_base_url: String,
    /// Login entry point used for redirects.
    pub login_path: String,
    /// SQLite file holding the persisted session record.
    pub session_db: PathBuf,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>, session_db: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: normalize_base_url(&api_base_url.into()),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            session_db: session_db.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from the process environment.
    ///
    /// - `CATEQUESIS_API_URL` (default `http://localhost:3000/api`)
    /// - `CATEQUESIS_LOGIN_PATH` (default `/login`)
    /// - `CATEQUESIS_SESSION_DB` (default `{app_data_dir}/catequesis/session.db`)
    /// - `CATEQUESIS_HTTP_TIMEOUT_SECS` (default `15`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = normalize_base_url(&get("CATEQUESIS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()));
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "CATEQUESIS_API_URL",
                reason: format!("'{api_base_url}' is not an http(s) URL"),
            });
        }

        let login_path = get("CATEQUESIS_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                var: "CATEQUESIS_LOGIN_PATH",
                reason: "must start with '/'".to_string(),
            });
        }

        let session_db = match get("CATEQUESIS_SESSION_DB") {
            Some(path) => PathBuf::from(path),
            None => default_session_db_path().ok_or(ConfigError::NoDataDir)?,
        };

        let request_timeout = match get("CATEQUESIS_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "CATEQUESIS_HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "CATEQUESIS_HTTP_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_base_url,
            login_path,
            session_db,
            request_timeout,
        })
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
