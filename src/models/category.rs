//! Category model

use serde::{Deserialize, Serialize};

/// Named classification tag attachable to any number of posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// Unique display name
    pub name: String,
}
