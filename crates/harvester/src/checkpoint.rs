//! Per-`(tenant_id, provider_name)` cursor persistence (§4.G
//! `CheckpointCursor`). A cursor of `cursor_time` means "events with
//! `event_time > cursor_time` have not yet been harvested by this provider
//! for this tenant" — advanced only after the harvester has durably
//! persisted the batch that earns the new value.

use chrono::{DateTime, TimeZone, Utc};
use openlabels_core::error::Result;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

pub struct CheckpointRepository;

impl CheckpointRepository {
    /// Epoch cursor for a provider that has never run for this tenant,
    /// guaranteeing the first `harvest` call sees everything available.
    pub fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).single().expect("epoch is a valid timestamp")
    }

    pub async fn load_cursor(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        provider_name: &str,
    ) -> Result<DateTime<Utc>> {
        let cursor: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT cursor_time FROM checkpoint_cursors WHERE tenant_id = $1 AND provider_name = $2",
        )
        .bind(tenant_id)
        .bind(provider_name)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(cursor.unwrap_or_else(Self::epoch))
    }

    pub async fn advance_cursor(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        provider_name: &str,
        new_cursor: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO checkpoint_cursors (tenant_id, provider_name, cursor_time) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (tenant_id, provider_name) DO UPDATE SET cursor_time = EXCLUDED.cursor_time \
             WHERE checkpoint_cursors.cursor_time < EXCLUDED.cursor_time",
        )
        .bind(tenant_id)
        .bind(provider_name)
        .bind(new_cursor)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_the_unix_epoch() {
        assert_eq!(CheckpointRepository::epoch().timestamp(), 0);
    }
}
