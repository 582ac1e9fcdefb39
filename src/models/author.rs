//! Author model

use serde::{Deserialize, Serialize};

/// Content-authorship identity wrapping exactly one user.
///
/// The display name is always the wrapped user's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}
