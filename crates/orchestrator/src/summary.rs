//! Writes the per-job `ScanSummary` pre-aggregate once a job reaches a
//! terminal state (§3 "ScanSummary").

use crate::repository::ScanRepository;
use chrono::Utc;
use openlabels_core::error::Result;
use std::sync::Arc;
use uuid::Uuid;

pub async fn write_summary(repo: &Arc<ScanRepository>, tenant_id: Uuid, job_id: Uuid) -> Result<()> {
    let (tier_counts, top_entity_types) = repo.compute_summary_stats(tenant_id, job_id).await?;
    let started_at = repo.oldest_started_at(tenant_id, job_id).await?;
    let duration_seconds = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;

    // No label-application engine is in scope here (Microsoft Purview
    // integration is a platform-specific open question, see DESIGN.md); the
    // field exists on the row for when one is wired in.
    let label_stats = serde_json::json!({});

    repo.insert_scan_summary(
        tenant_id,
        job_id,
        tier_counts,
        top_entity_types,
        duration_seconds.max(0.0),
        label_stats,
    )
    .await
}
