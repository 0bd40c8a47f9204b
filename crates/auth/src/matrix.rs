//! Static role → permission mapping.
//!
//! The matrix is the single source of truth for "which roles may do what".
//! It is built once from a literal table and never mutated afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::Role;
use crate::permissions::{self, Permission};

use crate::roles::Role::{Admin, Catequista, Consulta, Parroco, Secretaria};

static STANDARD: LazyLock<PermissionMatrix> = LazyLock::new(|| {
    PermissionMatrix::from_entries([
        (permissions::VIEW_DASHBOARD, vec![Admin, Parroco, Secretaria, Catequista, Consulta]),
        (permissions::VIEW_CATEQUIZANDOS, vec![Admin, Parroco, Secretaria, Catequista, Consulta]),
        (permissions::MANAGE_CATEQUIZANDOS, vec![Admin, Parroco, Secretaria]),
        (permissions::VIEW_CATEQUISTAS, vec![Admin, Parroco, Secretaria, Consulta]),
        (permissions::MANAGE_CATEQUISTAS, vec![Admin, Parroco, Secretaria]),
        (permissions::VIEW_GRUPOS, vec![Admin, Parroco, Secretaria, Catequista, Consulta]),
        (permissions::MANAGE_GRUPOS, vec![Admin, Parroco, Secretaria]),
        (permissions::VIEW_ASISTENCIA, vec![Admin, Parroco, Secretaria, Catequista, Consulta]),
        (permissions::MANAGE_ASISTENCIA, vec![Admin, Parroco, Secretaria, Catequista]),
        (permissions::VIEW_CERTIFICADOS, vec![Admin, Parroco, Secretaria, Catequista, Consulta]),
        (permissions::MANAGE_CERTIFICADOS, vec![Admin, Parroco, Secretaria]),
        (permissions::VIEW_REPORTS, vec![Admin, Parroco, Secretaria, Consulta]),
    ])
});

/// Permission key → roles allowed that permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    entries: BTreeMap<Permission, Vec<Role>>,
}

impl PermissionMatrix {
    /// The parish matrix shipped with the client.
    pub fn standard() -> &'static PermissionMatrix {
        &STANDARD
    }

    /// Build a matrix from `(key, roles)` pairs.
    ///
    /// Repeated keys are merged; role lists are de-duplicated and sorted.
    pub fn from_entries<I, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Permission, R)>,
        R: IntoIterator<Item = Role>,
    {
        let mut map: BTreeMap<Permission, Vec<Role>> = BTreeMap::new();
        for (key, roles) in entries {
            map.entry(key).or_default().extend(roles);
        }
        for roles in map.values_mut() {
            roles.sort();
            roles.dedup();
        }
        Self { entries: map }
    }

    /// Roles allowed `key`. Unknown keys yield an empty set.
    pub fn allowed_roles(&self, key: &str) -> &[Role] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether `role` is listed for `key` (no admin override at this layer).
    pub fn grants(&self, role: Role, key: &str) -> bool {
        self.allowed_roles(key).contains(&role)
    }

    /// Every permission key in the matrix, sorted.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.entries.keys()
    }

    /// Keys listed for `role`, sorted.
    pub fn permissions_for(&self, role: Role) -> Vec<&Permission> {
        self.entries
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(key, _)| key)
            .collect()
    }

    /// Per-role view of the matrix (for audit/display).
    pub fn role_definitions(&self) -> Vec<RoleDefinition> {
        Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                name: role.as_str().to_string(),
                description: role.description().to_string(),
                permissions: self
                    .permissions_for(role)
                    .into_iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
            })
            .collect()
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}
