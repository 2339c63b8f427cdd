//! User domain model.

use serde::{Deserialize, Serialize};

/// A stored user, keyed by the identity provider's uid.
///
/// Field names serialize in the wire casing the web client expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Internal identifier (uuid v4).
    pub id: String,
    /// The unique ID from the identity provider.
    pub firebase_uid: String,
    /// Normalized (trimmed, lowercased) email address.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Application-specific roles; every user starts as `user`.
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    /// RFC-3339 creation timestamp.
    pub created_at: String,
    /// RFC-3339 last-update timestamp.
    pub updated_at: String,
}

fn default_roles() -> Vec<String> {
    vec!["user".to_string()]
}

impl UserRecord {
    /// Creates a new record with a fresh id and timestamps.
    pub fn new(
        firebase_uid: impl Into<String>,
        email: &str,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            firebase_uid: firebase_uid.into(),
            email: email.trim().to_lowercase(),
            display_name,
            photo_url,
            roles: default_roles(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
