//! Navigation intents.
//!
//! The session layer never drives a navigation environment itself; it hands
//! one of these values back and the shell decides how to act on it.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Navigation {
    /// Go to `to`. `hard` asks for a full reload that drops in-memory view state.
    Redirect {
        to: String,
        hard: bool,
        return_to: Option<String>,
    },
    /// Return to the previous entry in history.
    Back,
}

impl Navigation {
    /// Soft redirect to the login entry point, remembering where the user was.
    pub fn to_login(login_path: &str, return_to: Option<&str>) -> Self {
        Navigation::Redirect {
            to: login_path.to_string(),
            hard: false,
            return_to: return_to.map(str::to_string),
        }
    }

    /// Full reload of `to` (used after logout).
    pub fn hard(to: &str) -> Self {
        Navigation::Redirect {
            to: to.to_string(),
            hard: true,
            return_to: None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Navigation::Redirect { to, .. } => Some(to),
            Navigation::Back => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Navigation::to_login("/login", Some("/grupos"))).unwrap();
        assert_eq!(json["kind"], "redirect");
        assert_eq!(json["to"], "/login");
        assert_eq!(json["return_to"], "/grupos");
        assert_eq!(json["hard"], false);

        let back = serde_json::to_value(Navigation::Back).unwrap();
        assert_eq!(back["kind"], "back");
    }

    #[test]
    fn hard_redirect_has_no_return_path() {
        let nav = Navigation::hard("/login");
        assert_eq!(nav.target(), Some("/login"));
        assert!(matches!(nav, Navigation::Redirect { hard: true, return_to: None, .. }));
    }
}
