//! Auth backend contract and its HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use catequesis_auth::Identity;
use catequesis_core::ParishId;

use crate::config::ClientConfig;
use crate::error::AuthApiError;
use crate::state::AccessToken;

/// Login form payload.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Parish selector (users attached to several parishes pick one).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parish_id: Option<ParishId>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            parish_id: None,
        }
    }

    pub fn with_parish(mut self, parish_id: ParishId) -> Self {
        self.parish_id = Some(parish_id);
        self
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("parish_id", &self.parish_id)
            .finish()
    }
}

/// `data` payload of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginGrant {
    pub user: Identity,
    pub token: AccessToken,
}

/// `{ success, data?, message? }` response wrapper used by the backend.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

/// Token-issuing backend.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for an identity and a token.
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthApiError>;

    /// Confirm that `token` is still valid.
    ///
    /// `Ok(Some(_))` carries a fresher identity when the backend sends one.
    async fn profile(&self, token: &AccessToken) -> Result<Option<Identity>, AuthApiError>;
}

#[async_trait]
impl<T> AuthApi for Arc<T>
where
    T: AuthApi + ?Sized,
{
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthApiError> {
        (**self).login(credentials).await
    }

    async fn profile(&self, token: &AccessToken) -> Result<Option<Identity>, AuthApiError> {
        (**self).profile(token).await
    }
}

/// [`AuthApi`] over HTTP (`POST /auth/login`, `GET /auth/profile`).
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthApi {
    pub fn new(config: &ClientConfig) -> Result<Self, AuthApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.api_base_url.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthApiError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthApiError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| AuthApiError::Network(e.to_string()))?;

        // Failure envelopes come back with 4xx as well as 200.
        let envelope = serde_json::from_str::<ApiEnvelope<LoginGrant>>(&body);

        match envelope {
            Ok(ApiEnvelope { success: false, message, .. }) => Err(AuthApiError::LoginFailed(
                message.unwrap_or_else(|| "login failed".to_string()),
            )),
            Ok(ApiEnvelope { success: true, data: Some(grant), .. }) if status.is_success() => {
                if grant.token.is_empty() {
                    return Err(AuthApiError::Parse("login response carried an empty token".to_string()));
                }
                Ok(grant)
            }
            Ok(ApiEnvelope { success: true, data: None, .. }) if status.is_success() => {
                Err(AuthApiError::Parse("login response is missing data".to_string()))
            }
            Ok(_) => Err(AuthApiError::Api(status.as_u16(), body)),
            Err(_) if !status.is_success() => Err(AuthApiError::Api(status.as_u16(), body)),
            Err(e) => Err(AuthApiError::Parse(e.to_string())),
        }
    }

    async fn profile(&self, token: &AccessToken) -> Result<Option<Identity>, AuthApiError> {
        let resp = self
            .client
            .get(self.url("/auth/profile"))
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| AuthApiError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthApiError::Api(status.as_u16(), resp.text().await.unwrap_or_default()));
        }

        // A 2xx is what confirms the token; the body is only used to refresh
        // the identity when it is recognisable.
        let body = resp.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(None);
        }

        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<Identity>>(&body) {
            let success = envelope.success;
            return Ok(envelope.data.filter(|_| success));
        }
        Ok(serde_json::from_str::<Identity>(&body).ok())
    }
}
