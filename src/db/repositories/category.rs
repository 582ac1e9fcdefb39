//! Category repository
//!
//! Database operations for categories.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a category with a unique name
    async fn create(&self, name: &str) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, name: &str) -> Result<Category> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("INSERT INTO categories (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(pool) => sqlx::query("INSERT INTO categories (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .with_context(|| format!("Failed to create category '{}'", name))?;

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = "SELECT id, name FROM categories WHERE id = ?";
        let category = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| {
                    row.map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                }),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| {
                    row.map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                }),
        };
        category.context("Failed to get category by ID")
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = "SELECT id, name FROM categories WHERE name = ?";
        let category = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(name)
                .fetch_optional(pool)
                .await
                .map(|row| {
                    row.map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                }),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(name)
                .fetch_optional(pool)
                .await
                .map(|row| {
                    row.map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                }),
        };
        category.context("Failed to get category by name")
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = "SELECT id, name FROM categories ORDER BY name";
        let categories = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).fetch_all(pool).await.map(|rows| {
                rows.iter()
                    .map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                    .collect()
            }),
            Backend::Mysql(pool) => sqlx::query(sql).fetch_all(pool).await.map(|rows| {
                rows.iter()
                    .map(|row| Category {
                        id: row.get("id"),
                        name: row.get("name"),
                    })
                    .collect()
            }),
        };
        categories.context("Failed to list categories")
    }
}
