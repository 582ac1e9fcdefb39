//! Capability checks
//!
//! A pure mapping from (viewer, action) to an access decision. Reading is
//! open to everyone, creating and editing posts needs membership in the
//! authors group, and the remaining mutations only need a logged-in user.

use crate::models::{User, AUTHORS_GROUP};

/// Something a viewer may try to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List, search or read posts
    ViewPosts,
    AddPost,
    ChangePost,
    DeletePost,
    /// Join the authors group
    BecomeAuthor,
}

/// Why an action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// Nobody is logged in
    Unauthenticated,
    /// Logged in but lacking the required group
    Forbidden,
}

/// Decide whether `user` (None for anonymous) may perform `action`
pub fn check(user: Option<&User>, action: Action) -> Result<(), Denied> {
    if action == Action::ViewPosts {
        return Ok(());
    }
    let user = user.ok_or(Denied::Unauthenticated)?;

    match action {
        Action::AddPost | Action::ChangePost if !user.in_group(AUTHORS_GROUP) => {
            Err(Denied::Forbidden)
        }
        _ => Ok(()),
    }
}

/// Boolean form of [`check`]
pub fn is_allowed(user: Option<&User>, action: Action) -> bool {
    check(user, action).is_ok()
}

/// Whether the viewer lacks authors-group membership (true for anonymous)
pub fn is_not_author(user: Option<&User>) -> bool {
    !user.is_some_and(|u| u.in_group(AUTHORS_GROUP))
}
