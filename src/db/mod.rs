//! Postgres backend: connection pool, migrations, health check.
//!
//! The [`crate::store::Store`] implementation lives in [`store`].

pub mod store;

use crate::error::{Error, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool.
pub struct Db {
    pool: PgPool,
    exclusion_limit: Option<usize>,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            exclusion_limit: None,
        }
    }

    /// Cap the number of ids bound into a single `<> ALL` predicate.
    /// Longer histories make the allocator filter client side.
    pub fn with_exclusion_limit(mut self, limit: usize) -> Self {
        self.exclusion_limit = Some(limit);
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
