//! Periodic sweep that deletes terminal queue rows older than the
//! retention window, under `AdvisoryLockId::JobCleanup` (§5 "Advisory locks
//! serialize singletons ... across the replica set").

use chrono::Utc;
use openlabels_core::jobs::JobQueue;
use openlabels_queue::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const RETENTION_DAYS: i64 = 30;
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn run_forever(pool: PgPool, queue: Arc<dyn JobQueue>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_once(&pool, &queue).await {
                    Ok(count) if count > 0 => info!(count, "cleaned up old terminal jobs"),
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "job cleanup cycle failed"),
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

async fn run_once(pool: &PgPool, queue: &Arc<dyn JobQueue>) -> openlabels_core::error::Result<u64> {
    let mut tx = pool.begin().await?;
    if !try_advisory_lock(&mut tx, AdvisoryLockId::JobCleanup).await? {
        tx.rollback().await?;
        return Ok(0);
    }
    tx.commit().await?;

    let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
    queue.cleanup_old_jobs(cutoff).await
}
