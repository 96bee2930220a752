//! Background sweep that recovers jobs abandoned by a crashed or hung worker.
//!
//! A worker that dequeues a row holds it until `leased_until`. If the worker
//! dies mid-job the row is never marked `completed`/`failed`, so it sits
//! `running` forever unless something notices the lease expired. This module
//! runs under [`AdvisoryLockId::StuckJobReclaim`] so only one instance across
//! the fleet performs the sweep each cycle.

use crate::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use crate::backoff::next_delay;
use openlabels_core::error::Result;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(1800);

pub struct Reclaimer {
    pool: PgPool,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl Reclaimer {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }

    /// Runs one reclaim cycle. Returns the number of rows reclaimed (reset to
    /// `pending`) plus the number moved to a terminal `failed` state because
    /// they had already exhausted their retries.
    pub async fn run_once(&self) -> Result<ReclaimOutcome> {
        let mut tx = self.pool.begin().await?;

        if !try_advisory_lock(&mut tx, AdvisoryLockId::StuckJobReclaim).await? {
            tx.rollback().await?;
            return Ok(ReclaimOutcome::default());
        }

        let exhausted = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            UPDATE queue SET status = 'failed', completed_at = now(),
                last_error = coalesce(last_error, 'worker lease expired and retries exhausted')
            WHERE status = 'running' AND leased_until < now() AND retry_count >= max_retries
            RETURNING id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let stuck_rows = sqlx::query_as::<_, (uuid::Uuid, i32)>(
            "SELECT id, retry_count FROM queue \
             WHERE status = 'running' AND leased_until < now() AND retry_count < max_retries \
             FOR UPDATE SKIP LOCKED",
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut reclaimed = 0u64;
        for (id, retry_count) in &stuck_rows {
            let new_retry_count = retry_count + 1;
            let delay = next_delay(new_retry_count as u32, self.backoff_base, self.backoff_max);
            let run_after = chrono::Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(60));

            sqlx::query(
                r#"
                UPDATE queue SET status = 'pending', leased_by = NULL, leased_until = NULL,
                    retry_count = $2, run_after = $3,
                    last_error = 'worker lease expired, job requeued'
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(new_retry_count)
            .bind(run_after)
            .execute(&mut *tx)
            .await?;

            reclaimed += 1;
        }

        tx.commit().await?;

        if reclaimed > 0 || !exhausted.is_empty() {
            info!(
                reclaimed,
                failed_permanently = exhausted.len(),
                "reclaimed stuck queue rows"
            );
        }

        Ok(ReclaimOutcome {
            reclaimed,
            failed_permanently: exhausted.len() as u64,
        })
    }

    /// Runs `run_once` on a fixed interval until `shutdown` signals true,
    /// same convention as `PullHarvestLoop`/`CatalogWriter`.
    pub async fn run_forever(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(error = %err, "reclaimer cycle failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimOutcome {
    pub reclaimed: u64,
    pub failed_permanently: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outcome_reclaims_nothing() {
        let outcome = ReclaimOutcome::default();
        assert_eq!(outcome.reclaimed, 0);
        assert_eq!(outcome.failed_permanently, 0);
    }
}
