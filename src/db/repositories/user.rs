//! User repository
//!
//! Database operations for users and their group memberships.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Every `User` returned here carries its group names.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateUserInput, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with an already hashed password
    async fn create(&self, input: &CreateUserInput, password_hash: &str) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Check whether a username is taken
    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    /// Check whether an email is taken
    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// Add a user to the named group, creating the group if missing.
    ///
    /// Returns `false` when the user already was a member.
    async fn add_to_group(&self, user_id: i64, group: &str) -> Result<bool>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput, password_hash: &str) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, input, password_hash).await,
            Backend::Mysql(pool) => create_user_mysql(pool, input, password_hash).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_sqlite(pool, "id = ?", UserKey::Id(id)).await,
            Backend::Mysql(pool) => get_user_mysql(pool, "id = ?", UserKey::Id(id)).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let key = UserKey::Text(username);
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_sqlite(pool, "username = ?", key).await,
            Backend::Mysql(pool) => get_user_mysql(pool, "username = ?", key).await,
        }
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM users WHERE username = ?";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_sqlite(pool, sql, username).await?,
            Backend::Mysql(pool) => count_mysql(pool, sql, username).await?,
        };
        Ok(count > 0)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM users WHERE email = ?";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_sqlite(pool, sql, email).await?,
            Backend::Mysql(pool) => count_mysql(pool, sql, email).await?,
        };
        Ok(count > 0)
    }

    async fn add_to_group(&self, user_id: i64, group: &str) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => add_to_group_sqlite(pool, user_id, group).await,
            Backend::Mysql(pool) => add_to_group_mysql(pool, user_id, group).await,
        }
    }
}

/// Lookup key for a single user row
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(
    pool: &SqlitePool,
    input: &CreateUserInput,
    password_hash: &str,
) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        username: input.username.clone(),
        email: input.email.clone(),
        password_hash: password_hash.to_string(),
        created_at: now,
        groups: Vec::new(),
    })
}

async fn get_user_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE {}",
        condition
    );
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    match row {
        Some(row) => {
            let mut user = row_to_user_sqlite(&row);
            user.groups = groups_of_sqlite(pool, user.id).await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

async fn groups_of_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT g.name FROM auth_groups g
        JOIN auth_user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to load user groups")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn count_sqlite(pool: &SqlitePool, sql: &str, value: &str) -> Result<i64> {
    let row = sqlx::query(sql)
        .bind(value)
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn add_to_group_sqlite(pool: &SqlitePool, user_id: i64, group: &str) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("INSERT OR IGNORE INTO auth_groups (name) VALUES (?)")
        .bind(group)
        .execute(&mut *tx)
        .await
        .context("Failed to ensure group exists")?;

    let group_id: i64 = sqlx::query("SELECT id FROM auth_groups WHERE name = ?")
        .bind(group)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to look up group")?
        .get("id");

    let result =
        sqlx::query("INSERT OR IGNORE INTO auth_user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add user to group")?;

    tx.commit().await.context("Failed to commit group membership")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        groups: Vec::new(),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(
    pool: &MySqlPool,
    input: &CreateUserInput,
    password_hash: &str,
) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        username: input.username.clone(),
        email: input.email.clone(),
        password_hash: password_hash.to_string(),
        created_at: now,
        groups: Vec::new(),
    })
}

async fn get_user_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE {}",
        condition
    );
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    match row {
        Some(row) => {
            let mut user = row_to_user_mysql(&row);
            user.groups = groups_of_mysql(pool, user.id).await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

async fn groups_of_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT g.name FROM auth_groups g
        JOIN auth_user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to load user groups")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn count_mysql(pool: &MySqlPool, sql: &str, value: &str) -> Result<i64> {
    let row = sqlx::query(sql)
        .bind(value)
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn add_to_group_mysql(pool: &MySqlPool, user_id: i64, group: &str) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("INSERT IGNORE INTO auth_groups (name) VALUES (?)")
        .bind(group)
        .execute(&mut *tx)
        .await
        .context("Failed to ensure group exists")?;

    let group_id: i64 = sqlx::query("SELECT id FROM auth_groups WHERE name = ?")
        .bind(group)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to look up group")?
        .get("id");

    let result =
        sqlx::query("INSERT IGNORE INTO auth_user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add user to group")?;

    tx.commit().await.context("Failed to commit group membership")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        groups: Vec::new(),
    }
}
