//! In-memory session model.

use serde::{Deserialize, Serialize};

use catequesis_auth::{Identity, PermissionEvaluator, PermissionMatrix};

/// Opaque bearer token issued by the login endpoint.
///
/// `Debug` is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    /// A persisted session is being validated or a login is in flight.
    /// Access decisions taken in this state are not trustworthy.
    Initializing,
    SettledAuthenticated,
    SettledUnauthenticated,
}

impl LoadingState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadingState::Initializing)
    }
}

/// Identity + token + loading state, published as one value.
///
/// Fields are private so that every value is built through a constructor
/// that keeps `authenticated ⇔ user ∧ token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: Option<Identity>,
    token: Option<AccessToken>,
    loading: LoadingState,
}

impl Session {
    /// Process start: nothing known yet.
    pub fn initializing() -> Self {
        Self {
            user: None,
            token: None,
            loading: LoadingState::Initializing,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            user: None,
            token: None,
            loading: LoadingState::SettledUnauthenticated,
        }
    }

    /// A persisted session adopted optimistically, pending revalidation.
    pub(crate) fn adopted(user: Identity, token: AccessToken) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            loading: LoadingState::Initializing,
        }
    }

    pub(crate) fn authenticated(user: Identity, token: AccessToken) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            loading: LoadingState::SettledAuthenticated,
        }
    }

    /// Same identity and token, different loading state.
    pub(crate) fn with_loading(&self, loading: LoadingState) -> Self {
        Self {
            loading,
            ..self.clone()
        }
    }

    pub(crate) fn with_user(&self, user: Identity) -> Self {
        Self {
            user: Some(user),
            ..self.clone()
        }
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub(crate) fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn loading(&self) -> LoadingState {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    /// True when nothing is held in memory (no identity, no token).
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.token.is_none()
    }

    /// Capability queries against this snapshot.
    pub fn evaluator<'a>(&'a self, matrix: &'a PermissionMatrix) -> PermissionEvaluator<'a> {
        let identity = if self.is_authenticated() { self.user.as_ref() } else { None };
        PermissionEvaluator::new(identity, matrix)
    }
}
