//! Fan-out scan mode (§4.F): pre-count, partition materialization, and the
//! per-partition worker. The terminal aggregator lives in `handlers.rs`
//! since it is driven by the queue's retry path rather than called directly.

use crate::backpressure::Backpressure;
use crate::config::{COUNTER_BATCH_SIZE, DEFAULT_PARTITION_TARGET_SIZE, MAX_PRECOUNT_PAGES, PARTITION_MAX_RETRIES};
use crate::pipeline_runner;
use crate::repository::ScanRepository;
use crate::types::{PartitionSpec, ScanTotals};
use openlabels_adapters::Adapter;
use openlabels_core::error::Result;
use openlabels_detection::DetectionPipeline;
use openlabels_scoring::Policy;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct PrecountResult {
    pub estimated_files: u64,
    /// `false` once sampling gave up early because the count already cleared
    /// the fan-out threshold — an exact total isn't needed to know fan-out
    /// is the right mode.
    pub exact: bool,
}

/// Samples the adapter's enumeration to estimate total file count (§4.F
/// "Pre-count"). Stops as soon as either the adapter reports its last page
/// (exact count known) or the running count clears `threshold` (fan-out is
/// certain regardless of the exact total), bounded by `MAX_PRECOUNT_PAGES` as
/// a hard backstop against an adapter that never terminates a sample cheaply.
pub async fn precount(adapter: &dyn Adapter, threshold: u64) -> Result<PrecountResult> {
    let mut cursor: Option<String> = None;
    let mut total = 0u64;
    let mut pages = 0u32;

    loop {
        let page = adapter.enumerate(cursor.as_deref()).await?;
        total += page.files.len() as u64;
        pages += 1;

        if page.is_last_page {
            return Ok(PrecountResult { estimated_files: total, exact: true });
        }
        if total > threshold || pages >= MAX_PRECOUNT_PAGES {
            return Ok(PrecountResult { estimated_files: total, exact: false });
        }
        cursor = page.next_cursor.clone();
    }
}

/// Materializes partition boundaries by walking the adapter's own cursor
/// pagination and cutting a new partition every `partition_target_size`
/// files (§4.F step 2). Capped at `max_partitions`: once reached, remaining
/// files fold into the final partition rather than producing more rows than
/// the cap allows.
pub async fn plan_partitions(
    adapter: &dyn Adapter,
    partition_target_size: u64,
    max_partitions: u32,
) -> Result<Vec<PartitionSpec>> {
    let partition_target_size = if partition_target_size == 0 {
        DEFAULT_PARTITION_TARGET_SIZE
    } else {
        partition_target_size
    };

    let mut boundaries: Vec<Option<String>> = vec![None];
    let mut cursor: Option<String> = None;
    let mut running = 0u64;

    loop {
        let page = adapter.enumerate(cursor.as_deref()).await?;
        running += page.files.len() as u64;
        let is_last = page.is_last_page;
        cursor = page.next_cursor.clone();

        if is_last {
            break;
        }
        if boundaries.len() as u32 >= max_partitions {
            break;
        }
        if running >= partition_target_size {
            boundaries.push(cursor.clone());
            running = 0;
        }
    }

    boundaries.truncate(max_partitions.max(1) as usize);

    Ok(boundaries
        .into_iter()
        .map(|start_cursor| PartitionSpec::CursorRange {
            start_cursor,
            max_files: partition_target_size,
        })
        .collect())
}

/// Runs one partition to completion (or until cancelled/failed), called from
/// the `scan_partition` job handler. Resumes from `last_processed_path` if
/// this is a retry of a partition that made partial progress (§4.F
/// "Resume").
#[allow(clippy::too_many_arguments)]
pub async fn run_partition(
    repo: &Arc<ScanRepository>,
    adapter: Arc<dyn Adapter>,
    pipeline: Arc<DetectionPipeline>,
    policies: Arc<Vec<Policy>>,
    tenant_id: Uuid,
    job_id: Uuid,
    partition_id: Uuid,
    worker_id: &str,
    max_concurrent_files: usize,
    memory_budget_mb: u64,
) -> Result<()> {
    let partition = repo.load_partition(tenant_id, partition_id).await?;
    repo.mark_partition_running(tenant_id, partition_id, worker_id).await?;

    let PartitionSpec::CursorRange { start_cursor, max_files } = partition.partition_spec;
    let mut cursor = partition.last_processed_path.clone().or(start_cursor);

    let backpressure = Arc::new(Backpressure::new(memory_budget_mb));
    let mut files_in_partition = 0u64;
    let mut unflushed = ScanTotals::default();
    let mut since_checkpoint = 0u64;

    loop {
        if repo.is_job_cancelled(tenant_id, job_id).await? {
            info!(job_id = %job_id, partition_id = %partition_id, "job cancelled, stopping partition");
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
            max_concurrent_files,
        )
        .await?;

        files_in_partition += page_totals.files_scanned;
        since_checkpoint += page_totals.files_scanned;
        unflushed.merge(&page_totals);

        if since_checkpoint >= COUNTER_BATCH_SIZE {
            repo.add_job_counters(tenant_id, job_id, &unflushed).await?;
            if let Some(path) = &unflushed.last_processed_path {
                repo.update_partition_cursor(tenant_id, partition_id, path, 0).await?;
            }
            unflushed = ScanTotals::default();
            since_checkpoint = 0;
        }

        cursor = page.next_cursor.clone();
        if page.is_last_page || files_in_partition >= max_files.saturating_mul(4) {
            break;
        }
    }

    if since_checkpoint > 0 {
        repo.add_job_counters(tenant_id, job_id, &unflushed).await?;
        if let Some(path) = &unflushed.last_processed_path {
            repo.update_partition_cursor(tenant_id, partition_id, path, 0).await?;
        }
    }

    repo.mark_partition_completed(tenant_id, job_id, partition_id).await?;
    Ok(())
}

/// Called when a partition handler's `run_partition` returns an error: bumps
/// the retry count, or marks the partition permanently failed once
/// `PARTITION_MAX_RETRIES` is exhausted. Either way the owning job is left
/// alone — partition failure never fails the job directly (§4.F).
pub async fn record_partition_failure(
    repo: &Arc<ScanRepository>,
    tenant_id: Uuid,
    job_id: Uuid,
    partition_id: Uuid,
) -> Result<bool> {
    let exhausted = repo
        .mark_partition_retry_or_failed(tenant_id, job_id, partition_id, PARTITION_MAX_RETRIES)
        .await?;
    if exhausted {
        warn!(job_id = %job_id, partition_id = %partition_id, "partition permanently failed after exhausting retries");
    }
    Ok(exhausted)
}
