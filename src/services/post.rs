//! Post service
//!
//! Business logic behind the portal pages:
//! - Paginated listing and filtered search, newest first
//! - Creating a post with its category in one step
//! - Editing a post (fields overwritten, categories only ever added)
//! - Deleting a post
//!
//! Author and category references are resolved before anything is written,
//! so a failed lookup never leaves a partial post behind.

use crate::db::repositories::{AuthorRepository, CategoryRepository, PostRepository};
use crate::models::{
    limit_for_listing, num_pages, resolve_page, Author, Category, CreatePostInput, InvalidPage,
    ListParams, NewPost, PagedResult, Post, PostFilter, PostQuery, RecordRef, UpdatePostInput,
    PAGE_SIZE,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post, author, category or page not found
    #[error("{0} not found")]
    NotFound(String),

    /// Requested page does not exist
    #[error(transparent)]
    InvalidPage(#[from] InvalidPage),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// One page of posts plus the listing threshold the templates use
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: PagedResult<Post>,
    /// Page count of the whole post table minus two
    pub limit_for_listing: i64,
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    authors: Arc<dyn AuthorRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        authors: Arc<dyn AuthorRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            posts,
            authors,
            categories,
        }
    }

    /// One page of all posts, newest first.
    ///
    /// `page` is the raw query value: absent means 1, `last` the final page.
    ///
    /// # Errors
    ///
    /// - `InvalidPage` if the page is not a number or out of range
    pub async fn list_page(&self, page: Option<&str>) -> Result<PostPage, PostServiceError> {
        let total = self.count().await?;
        let posts = self.fetch_page(&PostQuery::all(), total, page).await?;

        Ok(PostPage {
            posts,
            limit_for_listing: limit_for_listing(total),
        })
    }

    /// One page of the posts matching `filter`, newest first.
    ///
    /// An author or category reference that names no record matches nothing.
    /// `limit_for_listing` is always computed over all posts.
    pub async fn search(
        &self,
        filter: &PostFilter,
        page: Option<&str>,
    ) -> Result<PostPage, PostServiceError> {
        let all_posts = self.count().await?;

        let posts = match self.resolve_filter(filter).await? {
            Some(query) => {
                let total = self
                    .posts
                    .count(&query)
                    .await
                    .context("Failed to count matching posts")?;
                self.fetch_page(&query, total, page).await?
            }
            None => {
                let number = resolve_page(page, 1)?;
                PagedResult::new(Vec::new(), 0, &ListParams::new(number, PAGE_SIZE))
            }
        };

        Ok(PostPage {
            posts,
            limit_for_listing: limit_for_listing(all_posts),
        })
    }

    /// Get a post by ID
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such post exists
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post {}", id)))
    }

    /// Every post, newest first
    pub async fn all(&self) -> Result<Vec<Post>, PostServiceError> {
        Ok(self
            .posts
            .list(&PostQuery::all(), None)
            .await
            .context("Failed to list posts")?)
    }

    /// Total number of posts
    pub async fn count(&self) -> Result<i64, PostServiceError> {
        Ok(self
            .posts
            .count(&PostQuery::all())
            .await
            .context("Failed to count posts")?)
    }

    /// Display-only guess at the next post id (count + 1). Never used as a key.
    pub async fn next_post_id_hint(&self) -> Result<i64, PostServiceError> {
        Ok(self.count().await? + 1)
    }

    pub async fn authors(&self) -> Result<Vec<Author>, PostServiceError> {
        Ok(self.authors.list().await.context("Failed to list authors")?)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, PostServiceError> {
        Ok(self
            .categories
            .list()
            .await
            .context("Failed to list categories")?)
    }

    /// Create a post linked to one category.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the author or category does not exist (nothing is written)
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let author = self.require_author(&input.author).await?;
        let category = self.require_category(&input.category).await?;

        let new_post = NewPost {
            title: input.title,
            content: input.content,
            post_type: input.post_type,
            author_id: author.id,
        };
        let post = self
            .posts
            .create(&new_post, category.id)
            .await
            .context("Failed to create post")?;

        tracing::info!(
            post_id = post.id,
            author = %author.username,
            category = %category.name,
            "Post created"
        );
        Ok(post)
    }

    /// Overwrite a post's title, content, author and type, and add the given
    /// category if any. Existing category links are kept.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the post, author or category does not exist (nothing is written)
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        self.get(id).await?;
        let author = self.require_author(&input.author).await?;
        let category = match &input.add_category {
            Some(reference) => Some(self.require_category(reference).await?),
            None => None,
        };

        let changes = NewPost {
            title: input.title,
            content: input.content,
            post_type: input.post_type,
            author_id: author.id,
        };
        self.posts
            .update(id, &changes, category.as_ref().map(|c| c.id))
            .await
            .context("Failed to update post")?;

        tracing::info!(post_id = id, "Post updated");
        self.get(id).await
    }

    /// Delete a post and its category links
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such post exists
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self
            .posts
            .delete(id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(format!("Post {}", id)));
        }

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Wrap an existing user as an author
    pub async fn add_author(&self, user_id: i64) -> Result<Author, PostServiceError> {
        Ok(self
            .authors
            .create(user_id)
            .await
            .context("Failed to create author")?)
    }

    /// Create a new category
    pub async fn add_category(&self, name: &str) -> Result<Category, PostServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        // An all-digit name would be read as a category id in forms and filters.
        if name.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PostServiceError::ValidationError(
                "Category name cannot be only digits".to_string(),
            ));
        }
        if self.resolve_category(&RecordRef::Name(name.to_string())).await?.is_some() {
            return Err(PostServiceError::ValidationError(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(self
            .categories
            .create(name)
            .await
            .context("Failed to create category")?)
    }

    /// Look up an author by id or username
    pub async fn resolve_author(
        &self,
        reference: &RecordRef,
    ) -> Result<Option<Author>, PostServiceError> {
        let author = match reference {
            RecordRef::Id(id) => self.authors.get_by_id(*id).await,
            RecordRef::Name(name) => self.authors.get_by_username(name).await,
        };
        Ok(author.context("Failed to look up author")?)
    }

    /// Look up a category by id or name
    pub async fn resolve_category(
        &self,
        reference: &RecordRef,
    ) -> Result<Option<Category>, PostServiceError> {
        let category = match reference {
            RecordRef::Id(id) => self.categories.get_by_id(*id).await,
            RecordRef::Name(name) => self.categories.get_by_name(name).await,
        };
        Ok(category.context("Failed to look up category")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn require_author(&self, reference: &RecordRef) -> Result<Author, PostServiceError> {
        self.resolve_author(reference)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("Author '{}'", reference)))
    }

    async fn require_category(&self, reference: &RecordRef) -> Result<Category, PostServiceError> {
        self.resolve_category(reference)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("Category '{}'", reference)))
    }

    /// Turn a parsed filter into a storage query; `None` when a reference
    /// names no record, meaning nothing can match.
    async fn resolve_filter(
        &self,
        filter: &PostFilter,
    ) -> Result<Option<PostQuery>, PostServiceError> {
        let mut query = PostQuery {
            title_contains: filter.title.clone(),
            content_contains: filter.content.clone(),
            post_type: filter.post_type,
            created_from: filter.created_from(),
            created_until: filter.created_until(),
            ..PostQuery::default()
        };

        if let Some(reference) = &filter.author {
            match self.resolve_author(reference).await? {
                Some(author) => query.author_id = Some(author.id),
                None => return Ok(None),
            }
        }
        if let Some(reference) = &filter.category {
            match self.resolve_category(reference).await? {
                Some(category) => query.category_id = Some(category.id),
                None => return Ok(None),
            }
        }

        Ok(Some(query))
    }

    async fn fetch_page(
        &self,
        query: &PostQuery,
        total: i64,
        page: Option<&str>,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let number = resolve_page(page, num_pages(total, PAGE_SIZE))?;
        let params = ListParams::new(number, PAGE_SIZE);
        let items = self
            .posts
            .list(query, Some(&params))
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAuthorRepository, SqlxCategoryRepository, SqlxPostRepository,
    };
    use crate::db::{create_test_pool, migrations, test_sqlite, DynDatabasePool};
    use crate::models::{PostForm, PostType};
    use std::collections::HashMap;

    async fn setup_test_service() -> (DynDatabasePool, PostService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    /// Create a user wrapped as an author
    async fn create_test_author(pool: &DynDatabasePool, service: &PostService, name: &str) -> Author {
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'hash')",
        )
        .bind(name)
        .bind(format!("{}@example.com", name))
        .execute(test_sqlite(pool))
        .await
        .expect("Failed to create test user")
        .last_insert_rowid();
        service.add_author(user_id).await.unwrap()
    }

    fn create_input(title: &str, author: &str, post_type: &str, category: &str) -> CreatePostInput {
        CreatePostInput::from_form(&PostForm {
            title: Some(title.to_string()),
            content: Some(format!("Content of {}", title)),
            author: Some(author.to_string()),
            post_type: Some(post_type.to_string()),
            category: Some(category.to_string()),
        })
        .unwrap()
    }

    fn update_input(title: &str, author: &str, category: &str) -> UpdatePostInput {
        UpdatePostInput::from_form(&PostForm {
            title: Some(title.to_string()),
            content: Some("Edited".to_string()),
            author: Some(author.to_string()),
            post_type: Some("news".to_string()),
            category: Some(category.to_string()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_post_with_author_and_category() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();

        let post = service
            .create(create_input("Hello", "alice", "news", "tech"))
            .await
            .unwrap();

        let detail = service.get(post.id).await.unwrap();
        assert_eq!(detail.author_name, "alice");
        assert!(detail.has_category("tech"));
        assert_eq!(detail.post_type, PostType::News);
    }

    #[tokio::test]
    async fn test_create_accepts_author_id() {
        let (pool, service) = setup_test_service().await;
        let alice = create_test_author(&pool, &service, "alice").await;
        let tech = service.add_category("tech").await.unwrap();

        let post = service
            .create(create_input(
                "By id",
                &alice.id.to_string(),
                "article",
                &tech.id.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(post.author_id, alice.id);
    }

    #[tokio::test]
    async fn test_create_with_unknown_refs_writes_nothing() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();

        let no_author = service
            .create(create_input("Hello", "mallory", "news", "tech"))
            .await;
        assert!(matches!(no_author, Err(PostServiceError::NotFound(_))));

        let no_category = service
            .create(create_input("Hello", "alice", "news", "gardening"))
            .await;
        assert!(matches!(no_category, Err(PostServiceError::NotFound(_))));

        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_without_category_keeps_links() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        create_test_author(&pool, &service, "bob").await;
        service.add_category("tech").await.unwrap();
        service.add_category("sport").await.unwrap();
        let post = service
            .create(create_input("Hello", "alice", "article", "tech"))
            .await
            .unwrap();

        let updated = service
            .update(post.id, update_input("Renamed", "bob", ""))
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.author_name, "bob");
        assert_eq!(updated.post_type, PostType::News);
        assert_eq!(updated.categories.len(), 1);

        let updated = service
            .update(post.id, update_input("Renamed", "bob", "sport"))
            .await
            .unwrap();
        assert!(updated.has_category("tech"));
        assert!(updated.has_category("sport"));
    }

    #[tokio::test]
    async fn test_update_missing_refs_leaves_post_untouched() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();
        let post = service
            .create(create_input("Hello", "alice", "article", "tech"))
            .await
            .unwrap();

        let result = service
            .update(post.id, update_input("Changed", "alice", "nope"))
            .await;
        assert!(matches!(result, Err(PostServiceError::NotFound(_))));
        assert_eq!(service.get(post.id).await.unwrap().title, "Hello");

        let missing = service.update(999, update_input("x", "alice", "")).await;
        assert!(matches!(missing, Err(PostServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();
        let post = service
            .create(create_input("Hello", "alice", "news", "tech"))
            .await
            .unwrap();

        service.delete(post.id).await.unwrap();

        assert!(matches!(
            service.get(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_page_math() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();

        let empty = service.list_page(None).await.unwrap();
        assert_eq!(empty.posts.total_pages(), 1);
        assert_eq!(empty.limit_for_listing, -1);

        for i in 0..12 {
            service
                .create(create_input(&format!("Post {}", i), "alice", "news", "tech"))
                .await
                .unwrap();
        }

        let page = service.list_page(Some("3")).await.unwrap();
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts.total_pages(), 3);
        assert_eq!(page.limit_for_listing, 1);

        let last = service.list_page(Some("last")).await.unwrap();
        assert_eq!(last.posts.page, 3);

        assert!(matches!(
            service.list_page(Some("4")).await,
            Err(PostServiceError::InvalidPage(InvalidPage::OutOfRange(4)))
        ));
        assert!(matches!(
            service.list_page(Some("abc")).await,
            Err(PostServiceError::InvalidPage(InvalidPage::NotANumber(_)))
        ));
    }

    #[tokio::test]
    async fn test_search_without_params_equals_listing() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("tech").await.unwrap();
        for i in 0..7 {
            service
                .create(create_input(&format!("Post {}", i), "alice", "news", "tech"))
                .await
                .unwrap();
        }

        let filter = PostFilter::from_query(&HashMap::new());
        for page in [None, Some("2")] {
            let listed = service.list_page(page).await.unwrap();
            let searched = service.search(&filter, page).await.unwrap();
            let listed_ids: Vec<_> = listed.posts.items.iter().map(|p| p.id).collect();
            let searched_ids: Vec<_> = searched.posts.items.iter().map(|p| p.id).collect();
            assert_eq!(listed_ids, searched_ids);
            assert_eq!(listed.limit_for_listing, searched.limit_for_listing);
        }
    }

    #[tokio::test]
    async fn test_search_title_in_cyrillic() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        service.add_category("Новости").await.unwrap();
        service
            .create(create_input("Привет мир", "alice", "news", "Новости"))
            .await
            .unwrap();

        for needle in ["Привет", "привет мир"] {
            let params: HashMap<String, String> =
                [("title".to_string(), needle.to_string())].into_iter().collect();
            let result = service
                .search(&PostFilter::from_query(&params), None)
                .await
                .unwrap();
            assert_eq!(result.posts.total, 1, "{}", needle);
        }
    }

    #[tokio::test]
    async fn test_search_by_author_and_unknown_refs() {
        let (pool, service) = setup_test_service().await;
        create_test_author(&pool, &service, "alice").await;
        create_test_author(&pool, &service, "bob").await;
        service.add_category("tech").await.unwrap();
        service
            .create(create_input("A1", "alice", "news", "tech"))
            .await
            .unwrap();
        service
            .create(create_input("B1", "bob", "article", "tech"))
            .await
            .unwrap();
        service
            .create(create_input("A2", "alice", "article", "tech"))
            .await
            .unwrap();

        let params: HashMap<String, String> =
            [("author".to_string(), "alice".to_string())].into_iter().collect();
        let result = service
            .search(&PostFilter::from_query(&params), None)
            .await
            .unwrap();
        assert_eq!(result.posts.total, 2);
        assert!(result.posts.items.iter().all(|p| p.author_name == "alice"));

        let params: HashMap<String, String> =
            [("author".to_string(), "nobody".to_string())].into_iter().collect();
        let result = service
            .search(&PostFilter::from_query(&params), None)
            .await
            .unwrap();
        assert!(result.posts.is_empty());
        assert_eq!(result.limit_for_listing, -1);
    }

    #[tokio::test]
    async fn test_add_category_rejects_duplicates() {
        let (_pool, service) = setup_test_service().await;
        service.add_category("tech").await.unwrap();

        assert!(matches!(
            service.add_category(" tech ").await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.add_category("  ").await,
            Err(PostServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_add_category_rejects_digit_names() {
        let (_pool, service) = setup_test_service().await;
        let tech_id = service.add_category("tech").await.unwrap().id.to_string();

        for name in ["2024", tech_id.as_str()] {
            assert!(matches!(
                service.add_category(name).await,
                Err(PostServiceError::ValidationError(_))
            ));
        }
        assert_eq!(service.categories().await.unwrap().len(), 1);
        assert!(service.add_category("2024 olympics").await.is_ok());
    }
}
