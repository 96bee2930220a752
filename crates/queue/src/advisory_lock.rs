//! PostgreSQL advisory locks for distributed task coordination.
//!
//! Prevents duplicate work when multiple server/worker instances run behind
//! a load balancer. Each periodic background task is assigned a stable lock
//! ID. Before each cycle, the task tries `pg_try_advisory_xact_lock(id)` — if
//! another instance already holds the lock, this instance skips the cycle
//! and waits for the next interval. Advisory locks are transaction-scoped and
//! release automatically on commit or rollback, so a crashed instance never
//! permanently blocks the others.

use openlabels_core::error::Result;
use sqlx::{Postgres, Transaction};

/// Stable lock IDs for singleton background tasks. Values are arbitrary but
/// must stay unique and must never be renumbered once deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum AdvisoryLockId {
    EventFlush = 100_001,
    SiemExport = 100_002,
    EventHarvest = 100_003,
    M365Harvest = 100_004,
    MonitoringSync = 100_005,
    LabelSync = 100_006,
    StuckJobReclaim = 100_007,
    JobCleanup = 100_008,
}

/// Tries to acquire a transaction-scoped advisory lock.
///
/// Returns `Ok(true)` if the lock was acquired (this instance should run the
/// task this cycle) or `Ok(false)` if another instance already holds it — a
/// failed acquisition is not an error, just a signal to skip this cycle.
pub async fn try_advisory_lock(
    tx: &mut Transaction<'_, Postgres>,
    lock_id: AdvisoryLockId,
) -> Result<bool> {
    let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
        .bind(lock_id as i64)
        .fetch_one(&mut **tx)
        .await?;
    Ok(acquired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_ids_match_the_documented_stable_values() {
        assert_eq!(AdvisoryLockId::EventFlush as i64, 100_001);
        assert_eq!(AdvisoryLockId::SiemExport as i64, 100_002);
        assert_eq!(AdvisoryLockId::EventHarvest as i64, 100_003);
        assert_eq!(AdvisoryLockId::M365Harvest as i64, 100_004);
        assert_eq!(AdvisoryLockId::MonitoringSync as i64, 100_005);
        assert_eq!(AdvisoryLockId::LabelSync as i64, 100_006);
        assert_eq!(AdvisoryLockId::StuckJobReclaim as i64, 100_007);
        assert_eq!(AdvisoryLockId::JobCleanup as i64, 100_008);
    }
}
