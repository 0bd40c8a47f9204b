use serde::Serialize;
use thiserror::Error;

use crate::{Identity, Permission, PermissionMatrix, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Capability queries for the current identity.
///
/// - No IO
/// - No panics
/// - Cheap enough to call on every render
///
/// Views never inspect role strings directly; they ask this type.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    identity: Option<&'a Identity>,
    matrix: &'a PermissionMatrix,
}

impl<'a> PermissionEvaluator<'a> {
    pub fn new(identity: Option<&'a Identity>, matrix: &'a PermissionMatrix) -> Self {
        Self { identity, matrix }
    }

    /// Evaluator backed by [`PermissionMatrix::standard`].
    pub fn standard(identity: Option<&'a Identity>) -> Self {
        Self::new(identity, PermissionMatrix::standard())
    }

    pub fn identity(&self) -> Option<&'a Identity> {
        self.identity
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.map(|user| user.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Admin holds every permission; other roles hold what the matrix lists.
    pub fn has_permission(&self, key: impl AsRef<str>) -> bool {
        match self.role() {
            None => false,
            Some(Role::Admin) => true,
            Some(role) => self.matrix.grants(role, key.as_ref()),
        }
    }

    /// False for an empty list.
    pub fn has_any_permission<I>(&self, keys: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        keys.into_iter().any(|key| self.has_permission(key))
    }

    /// True for an empty list.
    pub fn has_all_permissions<I>(&self, keys: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        keys.into_iter().all(|key| self.has_permission(key))
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|current| roles.contains(&current))
    }

    /// `MANAGE_<RESOURCE>` check; the resource name is upper-cased first.
    pub fn can_manage(&self, resource: &str) -> bool {
        self.has_permission(Permission::manage(resource))
    }

    /// `VIEW_<RESOURCE>` check; the resource name is upper-cased first.
    pub fn can_view(&self, resource: &str) -> bool {
        self.has_permission(Permission::view(resource))
    }

    /// `has_permission` as a `Result`, for call sites that propagate with `?`.
    pub fn authorize(&self, key: impl AsRef<str>) -> Result<(), AuthzError> {
        let key = key.as_ref();
        if !self.is_authenticated() {
            return Err(AuthzError::Unauthenticated);
        }
        if self.has_permission(key) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(key.to_string()))
        }
    }

    /// Explain why a capability query answers the way it does.
    ///
    /// The `granted` flag always equals `has_permission(key)`.
    pub fn explain(&self, key: impl AsRef<str>) -> PermissionDecision {
        let key = key.as_ref();
        let allowed_roles = self.matrix.allowed_roles(key).to_vec();

        let reason = match self.role() {
            None => DecisionReason::Unauthenticated,
            Some(Role::Admin) => DecisionReason::AdminOverride,
            Some(_) if !self.matrix.contains(key) => DecisionReason::UnknownPermission,
            Some(role) if allowed_roles.contains(&role) => DecisionReason::RoleGranted,
            Some(_) => DecisionReason::RoleNotGranted,
        };

        PermissionDecision {
            permission: key.to_string(),
            granted: reason.grants(),
            role: self.role(),
            allowed_roles,
            reason,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision explanation (audit trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single capability query, with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    pub permission: String,
    pub granted: bool,
    pub role: Option<Role>,
    pub allowed_roles: Vec<Role>,
    pub reason: DecisionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Unauthenticated,
    AdminOverride,
    RoleGranted,
    RoleNotGranted,
    UnknownPermission,
}

impl DecisionReason {
    fn grants(self) -> bool {
        matches!(self, DecisionReason::AdminOverride | DecisionReason::RoleGranted)
    }

    pub fn message(self) -> &'static str {
        match self {
            DecisionReason::Unauthenticated => "no authenticated user",
            DecisionReason::AdminOverride => "admin holds every permission",
            DecisionReason::RoleGranted => "role is listed for this permission",
            DecisionReason::RoleNotGranted => "role is not listed for this permission",
            DecisionReason::UnknownPermission => "permission key is not in the matrix",
        }
    }
}
