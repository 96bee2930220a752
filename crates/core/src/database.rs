//! Operational store connection pooling.
//!
//! Unlike the schema-per-tenant pool cache this module is adapted from, every
//! table in the data model (§3 of `SPEC_FULL.md`) carries its own `tenant_id`
//! column and every repository query filters on it explicitly. There is
//! therefore exactly one `PgPool`, shared by all tenants: connection count
//! does not grow with tenant count, and there is no per-tenant schema to
//! create, migrate, or drop. See `DESIGN.md` for why this departs from the
//! teacher's original architecture.

use crate::{config::DatabaseConfig, error::Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

/// Shared operational-store connection pool.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("initializing operational store connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("operational store connection pool ready");

        Ok(Self { pool })
    }

    /// Access to the shared pool for repository implementations.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the operational schema defined directly from `SPEC_FULL.md`
    /// §3. The core treats the migration system as an external collaborator
    /// (see the resolved open question in `SPEC_FULL.md` §9) and does not
    /// attempt to reconstruct a migration chain; this is the one canonical
    /// schema definition.
    pub async fn apply_schema(&self) -> Result<()> {
        let statements = include_str!("../sql/schema.sql");
        for statement in statements.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_sql_is_nonempty_and_statement_separated() {
        let statements = include_str!("../sql/schema.sql");
        let count = statements.split(';').filter(|s| !s.trim().is_empty()).count();
        assert!(count > 0);
    }
}
