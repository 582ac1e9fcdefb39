//! Author repository
//!
//! Authors are a thin wrapper around users; every query joins `users` to
//! pick up the display name.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Author;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const SELECT_AUTHOR: &str = r#"
    SELECT a.id, a.user_id, u.username
    FROM authors a
    JOIN users u ON u.id = a.user_id
"#;

/// Author repository trait
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Wrap an existing user as an author
    async fn create(&self, user_id: i64) -> Result<Author>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    /// Look up an author by the wrapped user's username
    async fn get_by_username(&self, username: &str) -> Result<Option<Author>>;

    /// All authors ordered by username
    async fn list(&self) -> Result<Vec<Author>>;
}

/// SQLx-based author repository implementation
pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, user_id: i64) -> Result<Author> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("INSERT INTO authors (user_id) VALUES (?)")
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(pool) => sqlx::query("INSERT INTO authors (user_id) VALUES (?)")
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .with_context(|| format!("Failed to create author for user {}", user_id))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author {} missing right after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by ID")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by ID")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Author>> {
        let sql = format!("{} WHERE u.username = ?", SELECT_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by username")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get author by username")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Author>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_authors_sqlite(pool).await,
            Backend::Mysql(pool) => list_authors_mysql(pool).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_authors_sqlite(pool: &SqlitePool) -> Result<Vec<Author>> {
    let sql = format!("{} ORDER BY u.username", SELECT_AUTHOR);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list authors")?;
    Ok(rows.iter().map(row_to_author_sqlite).collect())
}

fn row_to_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Author {
    Author {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_authors_mysql(pool: &MySqlPool) -> Result<Vec<Author>> {
    let sql = format!("{} ORDER BY u.username", SELECT_AUTHOR);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list authors")?;
    Ok(rows.iter().map(row_to_author_mysql).collect())
}

fn row_to_author_mysql(row: &sqlx::mysql::MySqlRow) -> Author {
    Author {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
    }
}
