//! Post repository
//!
//! Database operations for posts and their category links.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Posts are always returned newest first (`created_at`, then `id`, both
//! descending) with the author's username and the linked categories filled in.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Category, ListParams, NewPost, Post, PostQuery, PostType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

const SELECT_POST: &str = r#"
    SELECT p.id, p.title, p.content, p.post_type, p.author_id, p.created_at,
           u.username AS author_name
    FROM posts p
    JOIN authors a ON a.id = p.author_id
    JOIN users u ON u.id = a.user_id
"#;

const ORDER_NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post linked to one category, atomically
    async fn create(&self, post: &NewPost, category_id: i64) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Posts matching `query`, newest first; one page of them when `page` is given
    async fn list(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<Post>>;

    /// Number of posts matching `query`
    async fn count(&self, query: &PostQuery) -> Result<i64>;

    /// Overwrite the post's fields and optionally link one more category,
    /// atomically. Linking an already linked category is a no-op.
    async fn update(&self, id: i64, post: &NewPost, add_category: Option<i64>) -> Result<()>;

    /// Delete a post; returns `false` if it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &NewPost, category_id: i64) -> Result<Post> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_post_sqlite(pool, post, category_id).await?,
            Backend::Mysql(pool) => create_post_mysql(pool, post, category_id).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post {} missing right after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let posts = match self.pool.backend() {
            Backend::Sqlite(pool) => get_post_by_id_sqlite(pool, id).await?,
            Backend::Mysql(pool) => get_post_by_id_mysql(pool, id).await?,
        };
        Ok(posts.into_iter().next())
    }

    async fn list(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_posts_sqlite(pool, query, page).await,
            Backend::Mysql(pool) => list_posts_mysql(pool, query, page).await,
        }
    }

    async fn count(&self, query: &PostQuery) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_posts_sqlite(pool, query).await,
            Backend::Mysql(pool) => count_posts_mysql(pool, query).await,
        }
    }

    async fn update(&self, id: i64, post: &NewPost, add_category: Option<i64>) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_post_sqlite(pool, id, post, add_category).await,
            Backend::Mysql(pool) => update_post_mysql(pool, id, post, add_category).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to delete post {}", id))?;
        Ok(affected > 0)
    }
}

// ============================================================================
// Query building (shared by both drivers)
// ============================================================================

/// A bind argument of the dynamic WHERE clause
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

/// Build the WHERE clause for `query`, using `?` placeholders in the order
/// of the returned arguments.
fn where_clause(query: &PostQuery) -> (String, Vec<Arg>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();

    if let Some(needle) = &query.title_contains {
        conditions.push("p.title_search LIKE ? ESCAPE '!'");
        args.push(Arg::Text(like_pattern(needle)));
    }
    if let Some(needle) = &query.content_contains {
        conditions.push("p.content_search LIKE ? ESCAPE '!'");
        args.push(Arg::Text(like_pattern(needle)));
    }
    if let Some(author_id) = query.author_id {
        conditions.push("p.author_id = ?");
        args.push(Arg::Int(author_id));
    }
    if let Some(category_id) = query.category_id {
        conditions.push(
            "EXISTS (SELECT 1 FROM post_categories pc WHERE pc.post_id = p.id AND pc.category_id = ?)",
        );
        args.push(Arg::Int(category_id));
    }
    if let Some(post_type) = query.post_type {
        conditions.push("p.post_type = ?");
        args.push(Arg::Text(post_type.as_str().to_string()));
    }
    if let Some(from) = query.created_from {
        conditions.push("p.created_at >= ?");
        args.push(Arg::Time(from));
    }
    if let Some(until) = query.created_until {
        conditions.push("p.created_at < ?");
        args.push(Arg::Time(until));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), args)
    }
}

/// Case-folded copy of a searchable field.
///
/// Folding happens here and not in SQL: SQLite's `LOWER()` only folds ASCII.
fn search_key(text: &str) -> String {
    text.to_lowercase()
}

/// Substring pattern over `search_key` columns, LIKE wildcards escaped by `!`
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in search_key(needle).chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn list_sql(query: &PostQuery, page: Option<&ListParams>) -> (String, Vec<Arg>) {
    let (where_sql, mut args) = where_clause(query);
    let mut sql = format!("{} {} {}", SELECT_POST, where_sql, ORDER_NEWEST_FIRST);
    if let Some(page) = page {
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Arg::Int(page.limit()));
        args.push(Arg::Int(page.offset()));
    }
    (sql, args)
}

fn count_sql(query: &PostQuery) -> (String, Vec<Arg>) {
    let (where_sql, args) = where_clause(query);
    (
        format!("SELECT COUNT(*) as count FROM posts p {}", where_sql),
        args,
    )
}

fn categories_sql(post_count: usize) -> String {
    let placeholders = vec!["?"; post_count].join(", ");
    format!(
        r#"
        SELECT pc.post_id, c.id, c.name
        FROM post_categories pc
        JOIN categories c ON c.id = pc.category_id
        WHERE pc.post_id IN ({})
        ORDER BY c.name
        "#,
        placeholders
    )
}

fn parse_post_type(raw: &str) -> Result<PostType> {
    PostType::from_str(raw).ok_or_else(|| anyhow::anyhow!("Invalid post type: {}", raw))
}

fn attach_categories(posts: &mut [Post], mut links: HashMap<i64, Vec<Category>>) {
    for post in posts.iter_mut() {
        post.categories = links.remove(&post.id).unwrap_or_default();
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [Arg],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            Arg::Int(v) => query.bind(*v),
            Arg::Text(v) => query.bind(v.as_str()),
            Arg::Time(v) => query.bind(*v),
        };
    }
    query
}

async fn create_post_sqlite(pool: &SqlitePool, post: &NewPost, category_id: i64) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, title_search, content_search, post_type, author_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(search_key(&post.title))
    .bind(search_key(&post.content))
    .bind(post.post_type.as_str())
    .bind(post.author_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?
    .last_insert_rowid();

    sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
        .bind(id)
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .context("Failed to link post category")?;

    tx.commit().await.context("Failed to commit new post")?;
    Ok(id)
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Vec<Post>> {
    let sql = format!("{} WHERE p.id = ?", SELECT_POST);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    let mut posts = match row {
        Some(row) => vec![row_to_post_sqlite(&row)?],
        None => return Ok(Vec::new()),
    };
    let links = load_categories_sqlite(pool, &posts).await?;
    attach_categories(&mut posts, links);
    Ok(posts)
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    query: &PostQuery,
    page: Option<&ListParams>,
) -> Result<Vec<Post>> {
    let (sql, args) = list_sql(query, page);
    let rows = bind_sqlite(sqlx::query(&sql), &args)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let mut posts = rows
        .iter()
        .map(row_to_post_sqlite)
        .collect::<Result<Vec<_>>>()?;
    let links = load_categories_sqlite(pool, &posts).await?;
    attach_categories(&mut posts, links);
    Ok(posts)
}

async fn count_posts_sqlite(pool: &SqlitePool, query: &PostQuery) -> Result<i64> {
    let (sql, args) = count_sql(query);
    let row = bind_sqlite(sqlx::query(&sql), &args)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn load_categories_sqlite(
    pool: &SqlitePool,
    posts: &[Post],
) -> Result<HashMap<i64, Vec<Category>>> {
    let mut links: HashMap<i64, Vec<Category>> = HashMap::new();
    if posts.is_empty() {
        return Ok(links);
    }

    let sql = categories_sql(posts.len());
    let mut query = sqlx::query(&sql);
    for post in posts {
        query = query.bind(post.id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load post categories")?;

    for row in rows {
        links.entry(row.get("post_id")).or_default().push(Category {
            id: row.get("id"),
            name: row.get("name"),
        });
    }
    Ok(links)
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    id: i64,
    post: &NewPost,
    add_category: Option<i64>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, title_search = ?, content_search = ?, post_type = ?, author_id = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(search_key(&post.title))
    .bind(search_key(&post.content))
    .bind(post.post_type.as_str())
    .bind(post.author_id)
    .bind(id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to update post {}", id))?;

    if let Some(category_id) = add_category {
        sqlx::query("INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?, ?)")
            .bind(id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link post category")?;
    }

    tx.commit().await.context("Failed to commit post update")?;
    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let post_type: String = row.get("post_type");

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        post_type: parse_post_type(&post_type)?,
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        categories: Vec::new(),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &'q [Arg],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            Arg::Int(v) => query.bind(*v),
            Arg::Text(v) => query.bind(v.as_str()),
            Arg::Time(v) => query.bind(*v),
        };
    }
    query
}

async fn create_post_mysql(pool: &MySqlPool, post: &NewPost, category_id: i64) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, title_search, content_search, post_type, author_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(search_key(&post.title))
    .bind(search_key(&post.content))
    .bind(post.post_type.as_str())
    .bind(post.author_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?
    .last_insert_id() as i64;

    sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
        .bind(id)
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .context("Failed to link post category")?;

    tx.commit().await.context("Failed to commit new post")?;
    Ok(id)
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Vec<Post>> {
    let sql = format!("{} WHERE p.id = ?", SELECT_POST);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    let mut posts = match row {
        Some(row) => vec![row_to_post_mysql(&row)?],
        None => return Ok(Vec::new()),
    };
    let links = load_categories_mysql(pool, &posts).await?;
    attach_categories(&mut posts, links);
    Ok(posts)
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    query: &PostQuery,
    page: Option<&ListParams>,
) -> Result<Vec<Post>> {
    let (sql, args) = list_sql(query, page);
    let rows = bind_mysql(sqlx::query(&sql), &args)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let mut posts = rows
        .iter()
        .map(row_to_post_mysql)
        .collect::<Result<Vec<_>>>()?;
    let links = load_categories_mysql(pool, &posts).await?;
    attach_categories(&mut posts, links);
    Ok(posts)
}

async fn count_posts_mysql(pool: &MySqlPool, query: &PostQuery) -> Result<i64> {
    let (sql, args) = count_sql(query);
    let row = bind_mysql(sqlx::query(&sql), &args)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn load_categories_mysql(
    pool: &MySqlPool,
    posts: &[Post],
) -> Result<HashMap<i64, Vec<Category>>> {
    let mut links: HashMap<i64, Vec<Category>> = HashMap::new();
    if posts.is_empty() {
        return Ok(links);
    }

    let sql = categories_sql(posts.len());
    let mut query = sqlx::query(&sql);
    for post in posts {
        query = query.bind(post.id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load post categories")?;

    for row in rows {
        links.entry(row.get("post_id")).or_default().push(Category {
            id: row.get("id"),
            name: row.get("name"),
        });
    }
    Ok(links)
}

async fn update_post_mysql(
    pool: &MySqlPool,
    id: i64,
    post: &NewPost,
    add_category: Option<i64>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, title_search = ?, content_search = ?, post_type = ?, author_id = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(search_key(&post.title))
    .bind(search_key(&post.content))
    .bind(post.post_type.as_str())
    .bind(post.author_id)
    .bind(id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to update post {}", id))?;

    if let Some(category_id) = add_category {
        sqlx::query("INSERT IGNORE INTO post_categories (post_id, category_id) VALUES (?, ?)")
            .bind(id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link post category")?;
    }

    tx.commit().await.context("Failed to commit post update")?;
    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let post_type: String = row.get("post_type");

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        post_type: parse_post_type(&post_type)?,
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        categories: Vec::new(),
        created_at: row.get("created_at"),
    })
}
