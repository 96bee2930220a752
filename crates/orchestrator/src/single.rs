//! Single-partition scan mode (§4.F): walk the adapter directly, no
//! partition materialization.

use crate::backpressure::Backpressure;
use crate::config::COUNTER_BATCH_SIZE;
use crate::pipeline_runner;
use crate::repository::ScanRepository;
use crate::types::ScanTotals;
use openlabels_adapters::Adapter;
use openlabels_core::error::Result;
use openlabels_core::config::TenantOverrides;
use openlabels_detection::DetectionPipeline;
use openlabels_scoring::Policy;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    repo: &Arc<ScanRepository>,
    adapter: Arc<dyn Adapter>,
    pipeline: Arc<DetectionPipeline>,
    policies: Arc<Vec<Policy>>,
    tenant_id: Uuid,
    job_id: Uuid,
    overrides: &TenantOverrides,
) -> Result<()> {
    repo.mark_job_running(tenant_id, job_id).await?;

    let backpressure = Arc::new(Backpressure::new(overrides.pipeline_memory_budget_mb));
    let mut cursor: Option<String> = None;
    let mut unflushed = ScanTotals::default();
    let mut since_last_flush = 0u64;

    loop {
        if repo.is_job_cancelled(tenant_id, job_id).await? {
            info!(job_id = %job_id, "job cancelled, stopping single-partition walk");
            break;
        }

        let page = adapter.enumerate(cursor.as_deref()).await?;
        let page_totals = pipeline_runner::process_page(
            &page.files,
            &adapter,
            &pipeline,
            &policies,
            repo,
            tenant_id,
            job_id,
            &backpressure,
            overrides.pipeline_max_concurrent_files,
        )
        .await?;

        since_last_flush += page_totals.files_scanned;
        unflushed.merge(&page_totals);

        if since_last_flush >= COUNTER_BATCH_SIZE {
            repo.add_job_counters(tenant_id, job_id, &unflushed).await?;
            unflushed = ScanTotals::default();
            since_last_flush = 0;
        }

        cursor = page.next_cursor.clone();
        if page.is_last_page {
            break;
        }
    }

    if since_last_flush > 0 {
        repo.add_job_counters(tenant_id, job_id, &unflushed).await?;
    }

    repo.mark_job_completed(tenant_id, job_id).await?;
    crate::summary::write_summary(repo, tenant_id, job_id).await?;
    Ok(())
}
