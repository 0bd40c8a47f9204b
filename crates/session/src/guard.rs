//! Route guard: render, redirect or deny a protected view.

use serde::Serialize;

use catequesis_auth::{Permission, PermissionMatrix, Role};

use crate::navigation::Navigation;
use crate::state::{LoadingState, Session};
use crate::store::SessionStore;

/// Requirements of one protected view.
///
/// With no roles and no permissions the guard only asks for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    required_roles: Vec<Role>,
    required_permissions: Vec<Permission>,
    path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDenied {
    pub role: Role,
    pub required_roles: Vec<Role>,
    pub missing_permissions: Vec<String>,
    /// Offered to the user; the guard never navigates on its own.
    pub back: Navigation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still being restored; show a neutral placeholder.
    Loading,
    Redirect { navigation: Navigation },
    AccessDenied(AccessDenied),
    Render,
}

impl GuardDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard for the view mounted at `path` (sent back as `return_to`).
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn require_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles.extend(roles);
        self
    }

    pub fn require_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.required_permissions.extend(permissions);
        self
    }

    pub fn required_roles(&self) -> &[Role] {
        &self.required_roles
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Decide against the store's current session.
    pub fn check(&self, store: &SessionStore) -> GuardDecision {
        self.evaluate(&store.snapshot(), store.matrix(), store.login_path())
    }

    pub fn evaluate(&self, session: &Session, matrix: &PermissionMatrix, login_path: &str) -> GuardDecision {
        let redirect = || GuardDecision::Redirect {
            navigation: Navigation::to_login(login_path, self.path.as_deref()),
        };

        let user = match session.loading() {
            LoadingState::Initializing => return GuardDecision::Loading,
            LoadingState::SettledUnauthenticated => return redirect(),
            LoadingState::SettledAuthenticated => match session.user() {
                Some(user) => user,
                None => return redirect(),
            },
        };

        let evaluator = session.evaluator(matrix);

        let role_ok = self.required_roles.is_empty() || evaluator.has_any_role(&self.required_roles);
        let missing: Vec<String> = self
            .required_permissions
            .iter()
            .filter(|p| !evaluator.has_permission(p))
            .map(|p| p.as_str().to_string())
            .collect();

        if role_ok && missing.is_empty() {
            return GuardDecision::Render;
        }

        for key in &missing {
            let decision = evaluator.explain(key);
            tracing::debug!(
                user_id = %user.id,
                permission = %decision.permission,
                reason = decision.reason.message(),
                "route permission denied"
            );
        }
        tracing::debug!(
            user_id = %user.id,
            role = %user.role,
            path = self.path.as_deref().unwrap_or(""),
            "route access denied"
        );

        GuardDecision::AccessDenied(AccessDenied {
            role: user.role,
            required_roles: self.required_roles.clone(),
            missing_permissions: missing,
            back: Navigation::Back,
        })
    }
}
