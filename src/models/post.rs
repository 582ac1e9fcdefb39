//! Post model
//!
//! This module provides:
//! - `Post` entity, loaded with its author's display name and categories
//! - `PostType` enum for the two kinds of content
//! - `PostForm`, the raw submitted form, and the validated
//!   `CreatePostInput` / `UpdatePostInput` built from it
//! - `RecordRef` for naming an author or category either by id or by name

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub author_id: i64,
    /// Username of the wrapped author user
    pub author_name: String,
    /// Categories linked to this post, ordered by name
    #[serde(default)]
    pub categories: Vec<Category>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Check whether the post is linked to the named category
    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }
}

/// Kind of content a post carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Article,
    News,
}

impl PostType {
    pub const ALL: [PostType; 2] = [PostType::Article, PostType::News];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Article => "article",
            PostType::News => "news",
        }
    }

    /// Parse from database or form string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "article" => Some(PostType::Article),
            "news" => Some(PostType::News),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            PostType::Article => "Article",
            PostType::News => "News",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to an author or category as submitted in a form or query.
///
/// An all-digit value is taken as the record id; anything else is matched
/// against the username (authors) or the category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordRef {
    Id(i64),
    Name(String),
}

impl RecordRef {
    /// Parse a submitted value; blank values are absent
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i64>() {
            Ok(id) if raw.bytes().all(|b| b.is_ascii_digit()) => Some(RecordRef::Id(id)),
            _ => Some(RecordRef::Name(raw.to_string())),
        }
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordRef::Id(id) => write!(f, "#{}", id),
            RecordRef::Name(name) => f.write_str(name),
        }
    }
}

/// Raw create/edit form as submitted by the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl PostForm {
    fn required(value: &Option<String>, field: &str) -> Result<String, String> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(format!("Field '{}' is required", field)),
        }
    }

    fn post_type(&self) -> Result<PostType, String> {
        let raw = Self::required(&self.post_type, "post_type")?;
        PostType::from_str(&raw).ok_or_else(|| format!("Unknown post type '{}'", raw))
    }

    fn author(&self) -> Result<RecordRef, String> {
        let raw = Self::required(&self.author, "author")?;
        RecordRef::parse(&raw).ok_or_else(|| "Field 'author' is required".to_string())
    }
}

/// Validated input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub author: RecordRef,
    pub category: RecordRef,
}

impl CreatePostInput {
    /// Validate a submitted form; every field is required
    pub fn from_form(form: &PostForm) -> Result<Self, String> {
        let title = PostForm::required(&form.title, "title")?;
        let content = PostForm::required(&form.content, "content")?;
        let author = form.author()?;
        let post_type = form.post_type()?;
        let category = form
            .category
            .as_deref()
            .and_then(RecordRef::parse)
            .ok_or_else(|| "Field 'category' is required".to_string())?;

        Ok(Self {
            title,
            content,
            post_type,
            author,
            category,
        })
    }
}

/// Validated input for editing a post
///
/// Title, content, author and type are overwritten; the optional category
/// is added to the post's existing set.
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub author: RecordRef,
    pub add_category: Option<RecordRef>,
}

impl UpdatePostInput {
    /// Validate a submitted form; a blank category means none
    pub fn from_form(form: &PostForm) -> Result<Self, String> {
        Ok(Self {
            title: PostForm::required(&form.title, "title")?,
            content: PostForm::required(&form.content, "content")?,
            author: form.author()?,
            post_type: form.post_type()?,
            add_category: form.category.as_deref().and_then(RecordRef::parse),
        })
    }
}

/// Post row fields with the author already resolved, as written to storage
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub author_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, content: &str, author: &str, post_type: &str, category: &str) -> PostForm {
        PostForm {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            author: Some(author.to_string()),
            post_type: Some(post_type.to_string()),
            category: Some(category.to_string()),
        }
    }

    #[test]
    fn test_post_type_roundtrip() {
        for post_type in PostType::ALL {
            assert_eq!(PostType::from_str(post_type.as_str()), Some(post_type));
        }
        assert_eq!(PostType::from_str(" News "), Some(PostType::News));
        assert_eq!(PostType::from_str("blog"), None);
    }

    #[test]
    fn test_record_ref_parse() {
        assert_eq!(RecordRef::parse("42"), Some(RecordRef::Id(42)));
        assert_eq!(RecordRef::parse(" alice "), Some(RecordRef::Name("alice".into())));
        assert_eq!(RecordRef::parse("-3"), Some(RecordRef::Name("-3".into())));
        assert_eq!(RecordRef::parse("tech2"), Some(RecordRef::Name("tech2".into())));
        assert_eq!(RecordRef::parse("   "), None);
    }

    #[test]
    fn test_create_input_from_complete_form() {
        let input =
            CreatePostInput::from_form(&form("Hello", "World", "alice", "news", "tech")).unwrap();

        assert_eq!(input.title, "Hello");
        assert_eq!(input.post_type, PostType::News);
        assert_eq!(input.author, RecordRef::Name("alice".into()));
        assert_eq!(input.category, RecordRef::Name("tech".into()));
    }

    #[test]
    fn test_create_input_requires_every_field() {
        assert!(CreatePostInput::from_form(&form("", "c", "alice", "news", "tech")).is_err());
        assert!(CreatePostInput::from_form(&form("t", "c", "alice", "news", " ")).is_err());
        assert!(CreatePostInput::from_form(&form("t", "c", "", "news", "tech")).is_err());

        let err = CreatePostInput::from_form(&form("t", "c", "alice", "poem", "tech")).unwrap_err();
        assert!(err.contains("poem"));

        assert!(CreatePostInput::from_form(&PostForm::default()).is_err());
    }

    #[test]
    fn test_update_input_category_optional() {
        let input = UpdatePostInput::from_form(&form("t", "c", "3", "article", "")).unwrap();
        assert_eq!(input.author, RecordRef::Id(3));
        assert!(input.add_category.is_none());

        let input = UpdatePostInput::from_form(&form("t", "c", "3", "article", "sport")).unwrap();
        assert_eq!(input.add_category, Some(RecordRef::Name("sport".into())));
    }
}
