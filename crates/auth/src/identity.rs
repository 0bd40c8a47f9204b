//! Authenticated identity as issued by the backend and cached by the client.

use serde::{Deserialize, Serialize};

use catequesis_core::{ParishId, UserId};

use crate::Role;

/// Parish the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParishAffiliation {
    pub id: ParishId,
    pub name: String,
}

/// Profile of the authenticated user.
///
/// This is both the `data.user` payload of the login endpoint and the JSON
/// document kept in the persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parish: Option<ParishAffiliation>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Identity {
    pub fn parish_id(&self) -> Option<ParishId> {
        self.parish.as_ref().map(|p| p.id)
    }

    /// Return a copy with `update` merged in. Unset fields keep their value.
    pub fn merged(&self, update: &IdentityUpdate) -> Identity {
        let mut next = self.clone();
        if let Some(username) = &update.username {
            next.username = username.clone();
        }
        if let Some(role) = update.role {
            next.role = role;
        }
        if let Some(parish) = &update.parish {
            next.parish = parish.clone();
        }
        if let Some(active) = update.active {
            next.active = active;
        }
        next
    }
}

/// Partial identity update.
///
/// `parish: Some(None)` clears the affiliation; `parish: None` leaves it as is.
/// The user id is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub username: Option<String>,
    pub role: Option<Role>,
    pub parish: Option<Option<ParishAffiliation>>,
    pub active: Option<bool>,
}

impl IdentityUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn parish(mut self, parish: Option<ParishAffiliation>) -> Self {
        self.parish = Some(parish);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.role.is_none() && self.parish.is_none() && self.active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Identity {
        Identity {
            id: UserId::new(3),
            username: "maria".to_string(),
            role: Role::Catequista,
            parish: Some(ParishAffiliation {
                id: ParishId::new(10),
                name: "San José".to_string(),
            }),
            active: true,
        }
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let user = sample();
        let merged = user.merged(&IdentityUpdate::new().username("maria.g"));

        assert_eq!(merged.username, "maria.g");
        assert_eq!(merged.id, user.id);
        assert_eq!(merged.role, user.role);
        assert_eq!(merged.parish, user.parish);
    }

    #[test]
    fn merge_can_clear_parish() {
        let merged = sample().merged(&IdentityUpdate::new().parish(None));
        assert!(merged.parish.is_none());
        assert_eq!(merged.parish_id(), None);
    }

    #[test]
    fn missing_optional_fields_deserialize_with_defaults() {
        let json = r#"{"id": 1, "username": "admin", "role": "admin"}"#;
        let user: Identity = serde_json::from_str(json).unwrap();
        assert!(user.active);
        assert!(user.parish.is_none());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(IdentityUpdate::new().is_empty());
        assert!(!IdentityUpdate::new().active(false).is_empty());
    }
}
