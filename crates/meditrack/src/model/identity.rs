//! Signed-in identity and owner references.

use serde::{Deserialize, Serialize};

/// Name shown when the identity provider supplies none.
const FALLBACK_DISPLAY_NAME: &str = "Doctor";

/// Opaque reference to the identity that owns a record.
///
/// This is always the identity provider's stable id, never an e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap a provider-issued identity reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in user as reported by the identity provider.
///
/// Read-only to the rest of the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Stable opaque id; doubles as the owner reference on every record.
    pub id: OwnerId,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Contact e-mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    /// The owner reference to stamp on records created by this identity.
    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.id
    }

    /// Display name, or `"Doctor"` when none is set.
    #[must_use]
    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
    }

    /// Single-letter avatar placeholder used when there is no avatar URL.
    #[must_use]
    pub fn initial(&self) -> char {
        self.display_name
            .as_deref()
            .and_then(|name| name.trim().chars().next())
            .unwrap_or('D')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(display_name: Option<&str>) -> UserIdentity {
        UserIdentity {
            id: OwnerId::new("uid-1"),
            display_name: display_name.map(String::from),
            email: Some("ana@example.com".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_owner_is_id_not_email() {
        let user = identity(Some("Ana"));
        assert_eq!(user.owner().as_str(), "uid-1");
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(identity(Some("Ana")).display_name_or_default(), "Ana");
        assert_eq!(identity(None).display_name_or_default(), "Doctor");
        assert_eq!(identity(Some("  ")).display_name_or_default(), "Doctor");
    }

    #[test]
    fn test_initial() {
        assert_eq!(identity(Some("Ana")).initial(), 'A');
        assert_eq!(identity(None).initial(), 'D');
    }

    #[test]
    fn test_owner_id_serializes_transparently() {
        let json = serde_json::to_string(&OwnerId::new("uid-9")).unwrap();
        assert_eq!(json, "\"uid-9\"");
    }

    #[test]
    fn test_identity_json_uses_camel_case() {
        let mut user = identity(Some("Ana"));
        user.avatar_url = Some("https://img.example/a.png".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["displayName"], "Ana");
        assert_eq!(json["avatarUrl"], "https://img.example/a.png");
    }
}
