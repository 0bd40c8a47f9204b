use std::borrow::{Borrow, Cow};

use serde::{Deserialize, Serialize};

/// Permission key (e.g. `"MANAGE_GRUPOS"`).
///
/// Keys are modeled as strings because views compose them at runtime from a
/// resource name (`MANAGE_<RESOURCE>` / `VIEW_<RESOURCE>`). Keys that do not
/// appear in the matrix grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Key that guards write access to `resource` (`"grupos"` → `MANAGE_GRUPOS`).
    pub fn manage(resource: &str) -> Self {
        Self::composed("MANAGE", resource)
    }

    /// Key that guards read access to `resource` (`"grupos"` → `VIEW_GRUPOS`).
    pub fn view(resource: &str) -> Self {
        Self::composed("VIEW", resource)
    }

    fn composed(action: &str, resource: &str) -> Self {
        Self(Cow::Owned(format!("{action}_{}", resource.to_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// Lets the matrix be queried with a plain `&str` key.
impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission vocabulary
// ─────────────────────────────────────────────────────────────────────────────

pub const VIEW_DASHBOARD: Permission = Permission::from_static("VIEW_DASHBOARD");

pub const VIEW_CATEQUIZANDOS: Permission = Permission::from_static("VIEW_CATEQUIZANDOS");
pub const MANAGE_CATEQUIZANDOS: Permission = Permission::from_static("MANAGE_CATEQUIZANDOS");

pub const VIEW_CATEQUISTAS: Permission = Permission::from_static("VIEW_CATEQUISTAS");
pub const MANAGE_CATEQUISTAS: Permission = Permission::from_static("MANAGE_CATEQUISTAS");

pub const VIEW_GRUPOS: Permission = Permission::from_static("VIEW_GRUPOS");
pub const MANAGE_GRUPOS: Permission = Permission::from_static("MANAGE_GRUPOS");

pub const VIEW_ASISTENCIA: Permission = Permission::from_static("VIEW_ASISTENCIA");
pub const MANAGE_ASISTENCIA: Permission = Permission::from_static("MANAGE_ASISTENCIA");

pub const VIEW_CERTIFICADOS: Permission = Permission::from_static("VIEW_CERTIFICADOS");
pub const MANAGE_CERTIFICADOS: Permission = Permission::from_static("MANAGE_CERTIFICADOS");

pub const VIEW_REPORTS: Permission = Permission::from_static("VIEW_REPORTS");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_keys_upper_case_the_resource() {
        assert_eq!(Permission::manage("certificados"), MANAGE_CERTIFICADOS);
        assert_eq!(Permission::view("Grupos"), VIEW_GRUPOS);
        assert_eq!(Permission::view("reports").as_str(), "VIEW_REPORTS");
    }

    #[test]
    fn borrowed_and_owned_keys_compare_equal() {
        assert_eq!(Permission::new("VIEW_DASHBOARD".to_string()), VIEW_DASHBOARD);
    }
}
