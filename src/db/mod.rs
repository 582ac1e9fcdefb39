//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL behind the
//! [`DatabasePool`] trait. The driver is selected from configuration.
//!
//! # Usage
//!
//! ```ignore
//! use newsportal::config::DatabaseConfig;
//! use newsportal::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

/// Underlying SQLite pool of a test database
#[cfg(test)]
pub(crate) fn test_sqlite(pool: &DynDatabasePool) -> &sqlx::SqlitePool {
    match pool.backend() {
        Backend::Sqlite(pool) => pool,
        Backend::Mysql(_) => panic!("test pool should be SQLite"),
    }
}
