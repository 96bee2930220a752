//! Persists harvested `RawAccessEvent` batches into `file_access_events`
//! (§4.G, §3). Tenant-scoped like every other persistence layer in the core:
//! every statement takes `tenant_id` and folds it into the inserted row or
//! `WHERE` clause.

use crate::types::RawAccessEvent;
use openlabels_core::error::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Persists a batch outside any caller-held transaction. Used by the
    /// stream manager, which has no transactional context to thread through
    /// (its providers poll independently of the pull harvester's cursor
    /// transaction).
    pub async fn persist_batch(&self, tenant_id: Uuid, events: &[RawAccessEvent]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::persist_batch_tx(&mut tx, tenant_id, events).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persists a batch as part of an already-open transaction, so the
    /// caller can commit the cursor advance in the same transaction as the
    /// rows that earned it (§4.G "commits the cursor only after successful
    /// persist").
    pub async fn persist_batch_tx(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        events: &[RawAccessEvent],
    ) -> Result<()> {
        for event in events {
            sqlx::query(
                "INSERT INTO file_access_events \
                    (tenant_id, file_path, action, user_name, process_name, event_time, event_source) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(tenant_id)
            .bind(&event.file_path)
            .bind(event.action.as_str())
            .bind(&event.user)
            .bind(&event.process)
            .bind(event.event_time)
            .bind(&event.event_source)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
