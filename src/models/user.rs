//! User model
//!
//! Users authenticate with a password and carry the names of the groups
//! they belong to; group membership is what the permission check looks at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group whose members may create and edit posts
pub const AUTHORS_GROUP: &str = "authors";

/// A registered user, loaded together with its group names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    /// Names of the groups this user belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

impl User {
    /// Check membership in the named group
    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }

    /// Check membership in the authors group
    pub fn is_author(&self) -> bool {
        self.in_group(AUTHORS_GROUP)
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// Plaintext password (will be hashed)
    #[serde(default)]
    pub password: String,
}
