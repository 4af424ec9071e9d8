//! Chat identifiers.
//!
//! The platform addresses users and groups by JID strings such as
//! `628123456789@s.whatsapp.net` and `120363025@g.us`. Users connected from a
//! linked device carry a device suffix (`628123456789:12@s.whatsapp.net`), which
//! is stripped so that the same person always maps to the same ledger key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Group chat identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// User identifier, normalised to its device-less form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_jid(raw.as_ref()))
    }

    /// Parse an optional raw field, treating blank strings as absent.
    pub fn parse_optional(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::new)
            .filter(|id| !id.0.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local part used when tagging a user in a notice (`@628123456789`).
    pub fn handle(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

fn normalize_jid(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((local, domain)) => {
            let local = local.split(':').next().unwrap_or(local);
            format!("{}@{}", local, domain.to_lowercase())
        }
        None => raw.split(':').next().unwrap_or(raw).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_suffix_is_stripped() {
        let with_device = UserId::new("628123456789:12@s.whatsapp.net");
        let plain = UserId::new("628123456789@s.whatsapp.net");
        assert_eq!(with_device, plain);
        assert_eq!(plain.handle(), "628123456789");
    }

    #[test]
    fn test_parse_optional_ignores_blank() {
        assert_eq!(UserId::parse_optional(None), None);
        assert_eq!(UserId::parse_optional(Some("   ")), None);
        assert_eq!(
            UserId::parse_optional(Some(" 1@s.whatsapp.net ")),
            Some(UserId::new("1@s.whatsapp.net"))
        );
    }

    #[test]
    fn test_user_id_deserializes_normalized() {
        let id: UserId = serde_json::from_str("\"99:3@S.WHATSAPP.NET\"").unwrap();
        assert_eq!(id.as_str(), "99@s.whatsapp.net");
    }
}
