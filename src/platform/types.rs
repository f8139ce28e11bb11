use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Presence as reported by the platform. Anything the gateway cannot
/// classify is `Unknown` and never touches the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[serde(alias = "active")]
    Online,
    #[serde(alias = "inactive", alias = "invisible")]
    Offline,
    #[serde(other)]
    Unknown,
}

impl Default for Presence {
    fn default() -> Self {
        Presence::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub presence: Presence,
}

/// Failure classes the reconciler branches on. Everything transient is
/// retried implicitly on the next pass, never within one.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform unreachable: {0}")]
    Transient(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("platform request failed: {0}")]
    Other(String),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_parses_platform_aliases() {
        let member: RosterMember =
            serde_json::from_str(r#"{"id":"m1","presence":"inactive"}"#).unwrap();
        assert_eq!(member.presence, Presence::Offline);
        let member: RosterMember =
            serde_json::from_str(r#"{"id":"m2","presence":"active"}"#).unwrap();
        assert_eq!(member.presence, Presence::Online);
    }

    #[test]
    fn unclassified_presence_becomes_unknown() {
        let member: RosterMember =
            serde_json::from_str(r#"{"id":"m1","presence":"dnd"}"#).unwrap();
        assert_eq!(member.presence, Presence::Unknown);
        let member: RosterMember = serde_json::from_str(r#"{"id":"m2"}"#).unwrap();
        assert_eq!(member.presence, Presence::Unknown);
        assert!(!member.bot);
    }
}
