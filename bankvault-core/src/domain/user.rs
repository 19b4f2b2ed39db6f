//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::encryption::CipherBlob;

/// A vault owner as stored.
///
/// `master_password` is normally a ciphertext blob. Rows written before
/// encryption existed may still hold the raw password; the comparison path
/// handles both.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub master_password: CipherBlob,
    /// Incremented on every write to the user or its banks
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, master_password: CipherBlob) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            master_password,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive lookup key for a username
    pub fn username_key(username: &str) -> String {
        username.trim().to_lowercase()
    }

    /// Strip the master password for returning to callers
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

/// User as returned across the operation boundary. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_key() {
        assert_eq!(User::username_key("Alice"), "alice");
        assert_eq!(User::username_key("  BOB_1 "), "bob_1");
    }

    #[test]
    fn test_public_view_has_no_secret() {
        let user = User::new("alice", CipherBlob::from_stored("00:00"));
        let public = user.to_public();
        let json = serde_json::to_value(&public).unwrap();

        assert_eq!(public.id, user.id);
        assert!(json.get("master_password").is_none());
        assert_eq!(json["username"], "alice");
    }
}
