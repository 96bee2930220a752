//! Postgres-backed durable job queue.
//!
//! Replaces the teacher's Redis-backed `RedisJobQueue` with a single-table
//! implementation of `openlabels_core::jobs::traits::JobQueue` over the
//! `queue` table (`sql/schema.sql`). Leasing uses `FOR UPDATE SKIP LOCKED` so
//! concurrent workers never pick up the same row; stuck leases are recovered
//! by the separate `reclaimer` module rather than by this type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::jobs::traits::{JobQueue, QueueStats};
use openlabels_core::jobs::types::{JobId, JobPriority, JobState, JobStatus, QueuedJob};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

/// How long a dequeued row stays leased before the reclaimer considers it
/// abandoned. Workers must finish (or heartbeat by re-leasing) within this
/// window.
const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(300);

pub struct PostgresJobQueue {
    pool: PgPool,
    lease_duration: Duration,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_duration: DEFAULT_LEASE_DURATION,
        }
    }

    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    fn row_to_queued_job(row: &sqlx::postgres::PgRow) -> Result<QueuedJob> {
        let id: Uuid = row.try_get("id")?;
        let task_type: String = row.try_get("task_type")?;
        let payload: serde_json::Value = row.try_get("payload")?;
        let priority: i32 = row.try_get("priority")?;
        let status_text: String = row.try_get("status")?;
        let retry_count: i32 = row.try_get("retry_count")?;
        let max_retries: i32 = row.try_get("max_retries")?;
        let run_after: DateTime<Utc> = row.try_get("run_after")?;
        let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at")?;
        let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at")?;
        let last_error: Option<String> = row.try_get("last_error")?;

        let state = match status_text.as_str() {
            "pending" if retry_count > 0 => JobState::Retrying,
            "pending" => JobState::Queued,
            "running" => JobState::Processing,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "cancelled" => JobState::Cancelled,
            other => {
                return Err(Error::new(
                    ErrorCode::JobDeserializationError,
                    format!("unrecognized queue.status value '{other}'"),
                ))
            }
        };

        let job_id = JobId::from_string(id.to_string());
        let status = JobStatus {
            id: job_id.clone(),
            job_type: task_type.clone(),
            state,
            priority: priority_from_i32(priority),
            created_at: enqueued_at,
            scheduled_for: Some(run_after),
            started_at: None,
            completed_at,
            attempts: retry_count.max(0) as u32,
            max_attempts: max_retries.max(0) as u32,
            last_error,
            metadata: Default::default(),
            progress: None,
            result: None,
        };

        Ok(QueuedJob {
            id: job_id,
            job_type: task_type,
            priority: priority_from_i32(priority),
            data: payload,
            status,
        })
    }
}

fn priority_from_i32(value: i32) -> JobPriority {
    match value {
        v if v >= 75 => JobPriority::Critical,
        v if v >= 50 => JobPriority::High,
        v if v >= 25 => JobPriority::Normal,
        _ => JobPriority::Low,
    }
}

fn priority_to_i32(priority: JobPriority) -> i32 {
    match priority {
        JobPriority::Critical => 75,
        JobPriority::High => 50,
        JobPriority::Normal => 25,
        JobPriority::Low => 0,
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<JobId> {
        let id = Uuid::parse_str(job.id.as_str())
            .map_err(|e| Error::new(ErrorCode::ValidationFailed, format!("invalid job id: {e}")))?;
        let run_after = job.status.scheduled_for.unwrap_or_else(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO queue (id, task_type, payload, priority, status, max_retries, run_after, enqueued_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&job.job_type)
        .bind(&job.data)
        .bind(priority_to_i32(job.priority))
        .bind(job.status.max_attempts as i32)
        .bind(run_after)
        .bind(job.status.created_at)
        .execute(&self.pool)
        .await?;

        Ok(job.id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueuedJob>> {
        let lease_seconds = self.lease_duration.as_secs() as f64;

        let row = sqlx::query(
            r#"
            UPDATE queue SET status = 'running', leased_by = $1,
                leased_until = now() + ($2 || ' seconds')::interval
            WHERE id = (
                SELECT id FROM queue
                WHERE status = 'pending' AND run_after <= now()
                ORDER BY priority DESC, enqueued_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, task_type, payload, priority, status, retry_count,
                      max_retries, run_after, enqueued_at, completed_at, last_error
            "#,
        )
        .bind(worker_id)
        .bind(lease_seconds.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_queued_job).transpose()
    }

    async fn get_status(&self, job_id: &JobId) -> Result<Option<JobStatus>> {
        let id = Uuid::parse_str(job_id.as_str())
            .map_err(|e| Error::new(ErrorCode::ValidationFailed, format!("invalid job id: {e}")))?;

        let row = sqlx::query(
            r#"
            SELECT id, task_type, payload, priority, status, retry_count,
                   max_retries, run_after, enqueued_at, completed_at, last_error
            FROM queue WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(|r| Self::row_to_queued_job(r).map(|j| j.status))
            .transpose()
    }

    async fn update_status(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        let id = Uuid::parse_str(job_id.as_str())
            .map_err(|e| Error::new(ErrorCode::ValidationFailed, format!("invalid job id: {e}")))?;

        let (status_text, leased_until, leased_by, completed_at) = match status.state {
            JobState::Queued | JobState::Retrying => ("pending", None, None, None),
            JobState::Processing => ("running", None, None, None),
            JobState::Completed => ("completed", None, None, Some(Utc::now())),
            JobState::Failed => ("failed", None, None, Some(Utc::now())),
            JobState::Cancelled => ("cancelled", None, None, Some(Utc::now())),
        };

        sqlx::query(
            r#"
            UPDATE queue SET status = $2, retry_count = $3, run_after = $4,
                leased_until = $5, leased_by = $6, completed_at = $7, last_error = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status_text)
        .bind(status.attempts as i32)
        .bind(status.scheduled_for.unwrap_or_else(Utc::now))
        .bind(leased_until as Option<DateTime<Utc>>)
        .bind(leased_by as Option<String>)
        .bind(completed_at)
        .bind(&status.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<bool> {
        let id = Uuid::parse_str(job_id.as_str())
            .map_err(|e| Error::new(ErrorCode::ValidationFailed, format!("invalid job id: {e}")))?;

        let result = sqlx::query(
            "UPDATE queue SET status = 'cancelled', completed_at = now() \
             WHERE id = $1 AND status IN ('pending', 'running')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending' AND retry_count = 0) AS queued,
                COUNT(*) FILTER (WHERE status = 'running') AS processing,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'pending' AND retry_count > 0) AS retrying,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM queue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_jobs: i64 = row.try_get("total")?;
        let completed_jobs: i64 = row.try_get("completed")?;
        let failed_jobs: i64 = row.try_get("failed")?;

        let error_rate = if total_jobs > 0 {
            Some(failed_jobs as f64 / total_jobs as f64)
        } else {
            None
        };

        Ok(QueueStats {
            total_jobs: total_jobs as u64,
            queued_jobs: row.try_get::<i64, _>("queued")? as u64,
            processing_jobs: row.try_get::<i64, _>("processing")? as u64,
            completed_jobs: completed_jobs as u64,
            failed_jobs: failed_jobs as u64,
            retrying_jobs: row.try_get::<i64, _>("retrying")? as u64,
            cancelled_jobs: row.try_get::<i64, _>("cancelled")? as u64,
            average_processing_time: None,
            jobs_per_minute: None,
            error_rate,
        })
    }

    async fn cleanup_old_jobs(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM queue WHERE status IN ('completed', 'failed', 'cancelled') \
             AND completed_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_jobs_by_status(&self, status: JobState, limit: Option<u32>) -> Result<Vec<QueuedJob>> {
        let status_text = match status {
            JobState::Queued | JobState::Retrying => "pending",
            JobState::Processing => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };

        let rows = sqlx::query(
            r#"
            SELECT id, task_type, payload, priority, status, retry_count,
                   max_retries, run_after, enqueued_at, completed_at, last_error
            FROM queue WHERE status = $1
            ORDER BY priority DESC, enqueued_at ASC
            LIMIT $2
            "#,
        )
        .bind(status_text)
        .bind(limit.unwrap_or(100) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_queued_job).collect()
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_roundtrips_through_its_integer_band() {
        for priority in [
            JobPriority::Low,
            JobPriority::Normal,
            JobPriority::High,
            JobPriority::Critical,
        ] {
            let value = priority_to_i32(priority);
            assert_eq!(priority_from_i32(value), priority);
        }
    }

    #[test]
    fn unknown_priority_value_falls_back_to_low() {
        assert_eq!(priority_from_i32(-5), JobPriority::Low);
    }
}
