//! Cron-driven scheduler that turns `schedules` rows into queued scan jobs.
//!
//! Runs as one process-local loop per replica. Exclusivity across replicas
//! doesn't go through an advisory lock — none of the stable lock IDs names
//! the scheduler, and the work it does (claim a handful of due rows, insert
//! jobs, advance `next_run_at`) is already naturally expressed as a
//! `FOR UPDATE SKIP LOCKED` claim on `schedules` itself, the same technique
//! the queue uses for job leasing.

use chrono::Utc;
use cron::Schedule;
use openlabels_core::error::{Error, ErrorCode, Result};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MIN_TRIGGER_INTERVAL: Duration = Duration::from_secs(60);
const SCAN_JOB_PRIORITY: i32 = 50;

pub struct Scheduler {
    pool: PgPool,
    poll_interval: Duration,
    min_trigger_interval: Duration,
}

impl Scheduler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_trigger_interval: DEFAULT_MIN_TRIGGER_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_min_trigger_interval(mut self, min_trigger_interval: Duration) -> Self {
        self.min_trigger_interval = min_trigger_interval;
        self
    }

    /// Claims and fires every due schedule once. Returns how many jobs were
    /// enqueued this cycle.
    pub async fn run_once(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let due: Vec<(Uuid, Uuid, Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, target_id, cron_expression
            FROM schedules
            WHERE enabled AND next_run_at <= now()
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut fired = 0u64;

        for (schedule_id, tenant_id, target_id, cron_expression) in due {
            let schedule = match Schedule::from_str(&normalize_cron(&cron_expression)) {
                Ok(s) => s,
                Err(err) => {
                    error!(
                        schedule_id = %schedule_id,
                        cron_expression,
                        error = %err,
                        "skipping schedule with unparseable cron expression"
                    );
                    continue;
                }
            };

            let now = Utc::now();
            let min_interval = chrono::Duration::from_std(self.min_trigger_interval).unwrap();
            let next_run_at = schedule
                .upcoming(Utc)
                .find(|candidate| *candidate - now >= min_interval)
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::ValidationFailed,
                        format!("cron expression '{cron_expression}' yields no future occurrence"),
                    )
                })?;

            if let Some(immediate) = schedule.upcoming(Utc).find(|candidate| *candidate > now) {
                if immediate != next_run_at {
                    warn!(
                        schedule_id = %schedule_id,
                        cron_expression,
                        "cron expression fires faster than min_trigger_interval, skipping ahead to clear the floor"
                    );
                }
            }

            let payload = serde_json::json!({
                "schedule_id": schedule_id,
                "target_id": target_id,
                "tenant_id": tenant_id,
            });

            sqlx::query(
                r#"
                INSERT INTO queue (tenant_id, task_type, payload, priority, status, run_after)
                VALUES ($1, 'scan', $2, $3, 'pending', now())
                "#,
            )
            .bind(tenant_id)
            .bind(&payload)
            .bind(SCAN_JOB_PRIORITY)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE schedules SET last_run_at = now(), next_run_at = $2 WHERE id = $1")
                .bind(schedule_id)
                .bind(next_run_at)
                .execute(&mut *tx)
                .await?;

            fired += 1;
        }

        tx.commit().await?;
        Ok(fired)
    }

    /// Runs `run_once` on the configured poll interval until `shutdown`
    /// signals true, same convention as `PullHarvestLoop`/`CatalogWriter`.
    pub async fn run_forever(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        error!(error = %err, "scheduler cycle failed");
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

/// The `cron` crate expects a leading seconds field; schedules are authored
/// in the usual 5-field form, so prefix `0` when only 5 fields are present.
fn normalize_cron(expression: &str) -> String {
    let field_count = expression.split_whitespace().count();
    if field_count == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_cron_prefixes_seconds_field_for_five_field_expressions() {
        assert_eq!(normalize_cron("*/5 * * * *"), "0 */5 * * * *");
    }

    #[test]
    fn normalize_cron_leaves_six_field_expressions_untouched() {
        assert_eq!(normalize_cron("0 */5 * * * *"), "0 */5 * * * *");
    }

    #[test]
    fn five_field_schedule_parses_after_normalization() {
        let parsed = Schedule::from_str(&normalize_cron("*/5 * * * *"));
        assert!(parsed.is_ok());
    }

    #[test]
    fn malformed_cron_expression_fails_to_parse() {
        let parsed = Schedule::from_str(&normalize_cron("not a cron expression"));
        assert!(parsed.is_err());
    }
}
