use core::str::FromStr;

use serde::{Deserialize, Serialize};

use catequesis_core::DomainError;

/// Role carried by an authenticated identity.
///
/// The set is closed: the backend only ever issues these five values, and
/// everything else is rejected at deserialization time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Parroco,
    Secretaria,
    Catequista,
    Consulta,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Parroco,
        Role::Secretaria,
        Role::Catequista,
        Role::Consulta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Parroco => "parroco",
            Role::Secretaria => "secretaria",
            Role::Catequista => "catequista",
            Role::Consulta => "consulta",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Human-readable label (for audit/display).
    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "System administrator with every permission",
            Role::Parroco => "Parish priest overseeing the whole catechesis programme",
            Role::Secretaria => "Parish secretary managing records and certificates",
            Role::Catequista => "Catechist running groups and taking attendance",
            Role::Consulta => "Read-only access to records and reports",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| DomainError::validation(format!("unknown role '{needle}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_lowercase_token() {
        let json = serde_json::to_string(&Role::Secretaria).unwrap();
        assert_eq!(json, "\"secretaria\"");
        let role: Role = serde_json::from_str("\"catequista\"").unwrap();
        assert_eq!(role, Role::Catequista);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>("\"sacristan\"").is_err());
        assert!(matches!("sacristan".parse::<Role>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("PARROCO".parse::<Role>().unwrap(), Role::Parroco);
        assert_eq!(" consulta ".parse::<Role>().unwrap(), Role::Consulta);
    }
}
