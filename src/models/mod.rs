//! Data models
//!
//! Database entities (Post, Author, Category, User, Session), the input
//! types handed to services, the search filter and pagination helpers.

mod author;
mod category;
mod pagination;
mod post;
mod post_filter;
mod session;
mod user;

pub use author::Author;
pub use category::Category;
pub use pagination::{
    limit_for_listing, num_pages, resolve_page, InvalidPage, ListParams, PageInfo, PagedResult,
    PAGE_SIZE,
};
pub use post::{
    CreatePostInput, NewPost, Post, PostForm, PostType, RecordRef, UpdatePostInput,
};
pub use post_filter::{FilterError, PostFilter, PostQuery};
pub use session::Session;
pub use user::{CreateUserInput, User, AUTHORS_GROUP};
