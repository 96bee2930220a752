//! Scan-trigger hook (§4.G): harvested `write`/`create` events on a
//! registered monitored file enqueue a high-priority single-file rescan
//! rather than waiting for that target's next full scan. Constructs the
//! same `scan_file` payload shape the orchestrator's `ScanFileHandler`
//! consumes, via the shared `JobQueue` trait directly — the harvester has no
//! compile-time dependency on the orchestrator crate.

use crate::types::RawAccessEvent;
use openlabels_core::error::Result;
use openlabels_core::jobs::{JobId, JobPriority, JobQueue, JobStatus};
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct ScanTriggerHook {
    queue: Arc<dyn JobQueue>,
}

impl ScanTriggerHook {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Looks up every monitored file touched by `events` and enqueues one
    /// `scan_file` job per match. Returns the number of rescans triggered.
    pub async fn maybe_trigger(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        events: &[RawAccessEvent],
    ) -> Result<u64> {
        let mut triggered = 0u64;
        for event in events {
            if !event.action.triggers_rescan() {
                continue;
            }

            let target_id: Option<Uuid> = sqlx::query_scalar(
                "SELECT target_id FROM monitored_files WHERE tenant_id = $1 AND file_path = $2",
            )
            .bind(tenant_id)
            .bind(&event.file_path)
            .fetch_optional(&mut **tx)
            .await?;

            let Some(target_id) = target_id else {
                continue;
            };

            let payload: Value = serde_json::json!({
                "tenant_id": tenant_id,
                "target_id": target_id,
                "file_path": event.file_path,
            });

            self.queue.enqueue(build_scan_file_job(payload)).await?;
            debug!(tenant_id = %tenant_id, file_path = %event.file_path, "scan-trigger hook enqueued rescan");
            triggered += 1;
        }
        Ok(triggered)
    }
}

fn build_scan_file_job(payload: Value) -> openlabels_core::jobs::types::QueuedJob {
    let status = JobStatus::new(JobId::new(), "scan_file", JobPriority::High).with_max_attempts(5);
    openlabels_core::jobs::types::QueuedJob {
        id: status.id.clone(),
        job_type: "scan_file".to_string(),
        priority: JobPriority::High,
        data: payload,
        status,
    }
}
