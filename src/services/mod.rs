//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - Validating input and resolving author/category references
//! - Enforcing the account and post rules
//! - Deciding who may do what (see [`policy`])

pub mod password;
pub mod policy;
pub mod post;
pub mod user;

pub use password::{hash_password, verify_password};
pub use policy::{Action, Denied};
pub use post::{PostPage, PostService, PostServiceError};
pub use user::{UserService, UserServiceError, DEFAULT_SESSION_TTL_DAYS};
