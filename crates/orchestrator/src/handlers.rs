//! `JobHandler` implementations that plug the orchestrator into the
//! existing `JobExecutor`/`JobQueue` machinery (§4.F). Three task types:
//! `scan` (entry point, decides single vs. fan-out), `scan_partition` (one
//! fan-out slice), and `scan_aggregate` (the terminal job that waits for all
//! partitions and writes the summary).

use crate::fanout;
use crate::repository::ScanRepository;
use crate::single;
use async_trait::async_trait;
use openlabels_adapters::AdapterConfig;
use openlabels_core::config::Config;
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::jobs::traits::JobContext;
use openlabels_core::jobs::types::{JobId, JobPriority, JobStatus, QueuedJob};
use openlabels_core::jobs::{JobHandler, JobQueue, JobResult};
use openlabels_core::security::EncryptionService;
use openlabels_detection::DetectionPipeline;
use openlabels_export::{ExportEngine, ExportSourceRepository};
use openlabels_scoring::Policy;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::types::ScanMode;

/// Shared handles every orchestrator job handler needs. Constructed once at
/// process startup and cloned cheaply (everything inside is an `Arc`).
pub struct OrchestratorContext {
    pub repo: Arc<ScanRepository>,
    pub encryption: Arc<EncryptionService>,
    pub config: Arc<Config>,
    pub queue: Arc<dyn JobQueue>,
    pub detection: Arc<DetectionPipeline>,
    pub worker_id: String,
    /// Set when `siem_export.mode` is `post_scan` or `both` (§4.I
    /// `export_scan`); `None` disables the post-completion push entirely so
    /// a tenant with SIEM export off doesn't pay for the extra query.
    pub export: Option<Arc<ExportEngine>>,
}

/// Fetches the job's freshly committed results and pushes them to every
/// configured sink, ignoring each sink's cursor (§4.I "a scan's results are
/// pushed once, in full"). Failures are logged, not propagated — a SIEM
/// outage must never fail or retry the scan job itself.
async fn maybe_export_scan(ctx: &OrchestratorContext, job_id: Uuid) {
    let Some(engine) = &ctx.export else {
        return;
    };

    let records = match ExportSourceRepository::scan_results_for_job(ctx.repo.pool(), job_id).await {
        Ok(records) => records,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "failed to load scan results for post-scan export");
            return;
        }
    };

    if records.is_empty() {
        return;
    }

    if let Err(err) = engine.export_scan(&records).await {
        error!(job_id = %job_id, error = %err, "post-scan SIEM export failed");
    }
}

#[derive(Deserialize)]
struct ScanJobPayload {
    tenant_id: Uuid,
    target_id: Uuid,
}

#[derive(Deserialize)]
struct ScanPartitionPayload {
    tenant_id: Uuid,
    job_id: Uuid,
    partition_id: Uuid,
}

#[derive(Deserialize)]
struct ScanAggregatorPayload {
    tenant_id: Uuid,
    job_id: Uuid,
}

async fn load_policies(ctx: &OrchestratorContext, tenant_id: Uuid) -> Result<Arc<Vec<Policy>>> {
    Ok(Arc::new(ctx.repo.load_enabled_policies(tenant_id).await?))
}

fn build_adapter(
    ctx: &OrchestratorContext,
    adapter_kind: &str,
    adapter_config_json: &Value,
) -> Result<Arc<dyn openlabels_adapters::Adapter>> {
    let _ = adapter_kind;
    let config: AdapterConfig = serde_json::from_value(adapter_config_json.clone())
        .map_err(|e| Error::new(ErrorCode::SerializationError, format!("invalid adapter_config: {e}")))?;
    openlabels_adapters::build_adapter(&config, &ctx.encryption)
}

fn enqueue_payload(job_type: &'static str, payload: Value, max_attempts: u32) -> QueuedJob {
    let status = JobStatus::new(JobId::new(), job_type, JobPriority::High).with_max_attempts(max_attempts);
    QueuedJob {
        id: status.id.clone(),
        job_type: job_type.to_string(),
        priority: JobPriority::High,
        data: payload,
        status,
    }
}

pub struct ScanJobHandler {
    pub ctx: Arc<OrchestratorContext>,
}

#[async_trait]
impl JobHandler for ScanJobHandler {
    fn job_type(&self) -> &'static str {
        "scan"
    }

    fn validate_job_data(&self, job_data: &Value) -> Result<()> {
        serde_json::from_value::<ScanJobPayload>(job_data.clone())
            .map(|_| ())
            .map_err(|e| Error::new(ErrorCode::InvalidInput, e.to_string()))
    }

    async fn handle(&self, job_data: &Value, _context: &JobContext) -> JobResult {
        match run_scan_job(&self.ctx, job_data).await {
            Ok(()) => JobResult::success(),
            Err(err) if err.is_retryable() => JobResult::retry(err.to_string()),
            Err(err) => JobResult::failed(err.to_string()),
        }
    }
}

async fn run_scan_job(ctx: &OrchestratorContext, job_data: &Value) -> Result<()> {
    let payload: ScanJobPayload = serde_json::from_value(job_data.clone())
        .map_err(|e| Error::new(ErrorCode::InvalidInput, e.to_string()))?;

    let target = ctx.repo.load_target(payload.tenant_id, payload.target_id).await?;
    let adapter = build_adapter(ctx, &target.adapter_kind, &target.adapter_config)?;
    let overrides = ctx.config.tenant_overrides(&payload.tenant_id.to_string());
    let policies = load_policies(ctx, payload.tenant_id).await?;

    let precount = if overrides.fanout_enabled {
        fanout::precount(adapter.as_ref(), overrides.fanout_threshold).await?
    } else {
        fanout::PrecountResult { estimated_files: 0, exact: true }
    };

    let use_fanout = overrides.fanout_enabled && precount.estimated_files > overrides.fanout_threshold;
    let mode = if use_fanout { ScanMode::Fanout } else { ScanMode::Single };

    let job_id = ctx.repo.create_job(payload.tenant_id, payload.target_id, mode).await?;
    info!(
        job_id = %job_id, tenant_id = %payload.tenant_id, mode = mode.as_str(),
        estimated_files = precount.estimated_files, exact = precount.exact,
        "starting scan job"
    );

    if use_fanout {
        let specs = fanout::plan_partitions(
            adapter.as_ref(),
            crate::config::DEFAULT_PARTITION_TARGET_SIZE,
            overrides.fanout_max_partitions,
        )
        .await?;

        ctx.repo.set_total_partitions(payload.tenant_id, job_id, specs.len() as i32).await?;
        ctx.repo.mark_job_running(payload.tenant_id, job_id).await?;

        for spec in &specs {
            let partition_id = ctx.repo.create_partition(payload.tenant_id, job_id, spec).await?;
            let partition_payload = serde_json::json!({
                "tenant_id": payload.tenant_id,
                "job_id": job_id,
                "partition_id": partition_id,
            });
            ctx.queue
                .enqueue(enqueue_payload("scan_partition", partition_payload, 5))
                .await?;
        }

        let aggregator_payload = serde_json::json!({
            "tenant_id": payload.tenant_id,
            "job_id": job_id,
        });
        ctx.queue
            .enqueue(enqueue_payload(
                "scan_aggregate",
                aggregator_payload,
                crate::config::AGGREGATOR_MAX_POLLS,
            ))
            .await?;
    } else {
        single::run(&ctx.repo, adapter, Arc::clone(&ctx.detection), policies, payload.tenant_id, job_id, &overrides)
            .await?;
        maybe_export_scan(ctx, job_id).await;
    }

    Ok(())
}

pub struct ScanPartitionHandler {
    pub ctx: Arc<OrchestratorContext>,
}

#[async_trait]
impl JobHandler for ScanPartitionHandler {
    fn job_type(&self) -> &'static str {
        "scan_partition"
    }

    fn validate_job_data(&self, job_data: &Value) -> Result<()> {
        serde_json::from_value::<ScanPartitionPayload>(job_data.clone())
            .map(|_| ())
            .map_err(|e| Error::new(ErrorCode::InvalidInput, e.to_string()))
    }

    async fn handle(&self, job_data: &Value, _context: &JobContext) -> JobResult {
        let payload: ScanPartitionPayload = match serde_json::from_value(job_data.clone()) {
            Ok(p) => p,
            Err(e) => return JobResult::failed(e.to_string()),
        };

        match run_scan_partition(&self.ctx, &payload).await {
            Ok(()) => JobResult::success(),
            Err(err) => {
                error!(job_id = %payload.job_id, partition_id = %payload.partition_id, error = %err, "partition run failed");
                match fanout::record_partition_failure(&self.ctx.repo, payload.tenant_id, payload.job_id, payload.partition_id).await {
                    Ok(true) => JobResult::failed(err.to_string()),
                    Ok(false) => JobResult::retry(err.to_string()),
                    Err(record_err) => JobResult::failed(format!("{err}; also failed to record retry: {record_err}")),
                }
            }
        }
    }
}

async fn run_scan_partition(ctx: &OrchestratorContext, payload: &ScanPartitionPayload) -> Result<()> {
    let job = ctx.repo.load_job(payload.tenant_id, payload.job_id).await?;
    let target = ctx.repo.load_target(payload.tenant_id, job.target_id).await?;
    let adapter = build_adapter(ctx, &target.adapter_kind, &target.adapter_config)?;
    let overrides = ctx.config.tenant_overrides(&payload.tenant_id.to_string());
    let policies = load_policies(ctx, payload.tenant_id).await?;

    fanout::run_partition(
        &ctx.repo,
        adapter,
        Arc::clone(&ctx.detection),
        policies,
        payload.tenant_id,
        payload.job_id,
        payload.partition_id,
        &ctx.worker_id,
        overrides.pipeline_max_concurrent_files,
        overrides.pipeline_memory_budget_mb,
    )
    .await
}

pub struct ScanAggregatorHandler {
    pub ctx: Arc<OrchestratorContext>,
}

#[async_trait]
impl JobHandler for ScanAggregatorHandler {
    fn job_type(&self) -> &'static str {
        "scan_aggregate"
    }

    fn validate_job_data(&self, job_data: &Value) -> Result<()> {
        serde_json::from_value::<ScanAggregatorPayload>(job_data.clone())
            .map(|_| ())
            .map_err(|e| Error::new(ErrorCode::InvalidInput, e.to_string()))
    }

    async fn handle(&self, job_data: &Value, context: &JobContext) -> JobResult {
        let payload: ScanAggregatorPayload = match serde_json::from_value(job_data.clone()) {
            Ok(p) => p,
            Err(e) => return JobResult::failed(e.to_string()),
        };

        match run_aggregator_cycle(&self.ctx, &payload).await {
            Ok(true) => JobResult::success(),
            Ok(false) => {
                if context.is_last_attempt() {
                    let _ = self.ctx.repo.mark_job_failed(payload.tenant_id, payload.job_id).await;
                    JobResult::failed("aggregator exhausted retries waiting for partitions to finish")
                } else {
                    JobResult::retry_with_delay(
                        "partitions still in flight",
                        crate::config::AGGREGATOR_POLL_DELAY.as_secs(),
                    )
                }
            }
            Err(err) => JobResult::retry(err.to_string()),
        }
    }
}

/// Returns `Ok(true)` once every partition is terminal and the job summary
/// has been written.
async fn run_aggregator_cycle(ctx: &OrchestratorContext, payload: &ScanAggregatorPayload) -> Result<bool> {
    let job = ctx.repo.load_job(payload.tenant_id, payload.job_id).await?;
    if job.status.is_terminal() {
        info!(job_id = %payload.job_id, status = job.status.as_str(), "job already terminal, aggregator stopping");
        return Ok(true);
    }

    let (completed, failed, total) = ctx.repo.partition_progress(payload.tenant_id, payload.job_id).await?;

    if total > 0 && completed + failed >= total {
        ctx.repo.mark_job_completed(payload.tenant_id, payload.job_id).await?;
        crate::summary::write_summary(&ctx.repo, payload.tenant_id, payload.job_id).await?;
        maybe_export_scan(ctx, payload.job_id).await;
        info!(job_id = %payload.job_id, completed, failed, total, "fan-out job completed");
        return Ok(true);
    }

    Ok(false)
}

#[derive(Deserialize)]
struct ScanFilePayload {
    tenant_id: Uuid,
    target_id: Uuid,
    file_path: String,
}

/// Handles the harvester's scan-trigger hook (§4.G): a single monitored file
/// changed, so it gets rescanned on its own rather than waiting for the next
/// full target scan. Reuses `ScanRepository`/`pipeline_runner` directly
/// instead of materializing a one-file fan-out partition.
pub struct ScanFileHandler {
    pub ctx: Arc<OrchestratorContext>,
}

#[async_trait]
impl JobHandler for ScanFileHandler {
    fn job_type(&self) -> &'static str {
        "scan_file"
    }

    fn validate_job_data(&self, job_data: &Value) -> Result<()> {
        serde_json::from_value::<ScanFilePayload>(job_data.clone())
            .map(|_| ())
            .map_err(|e| Error::new(ErrorCode::InvalidInput, e.to_string()))
    }

    async fn handle(&self, job_data: &Value, _context: &JobContext) -> JobResult {
        let payload: ScanFilePayload = match serde_json::from_value(job_data.clone()) {
            Ok(p) => p,
            Err(e) => return JobResult::failed(e.to_string()),
        };

        match run_scan_file(&self.ctx, &payload).await {
            Ok(()) => JobResult::success(),
            Err(err) if err.is_retryable() => JobResult::retry(err.to_string()),
            Err(err) => JobResult::failed(err.to_string()),
        }
    }
}

async fn run_scan_file(ctx: &OrchestratorContext, payload: &ScanFilePayload) -> Result<()> {
    use openlabels_adapters::FileInfo;
    use openlabels_core::types::ExposureLevel;

    let target = ctx.repo.load_target(payload.tenant_id, payload.target_id).await?;
    let adapter = build_adapter(ctx, &target.adapter_kind, &target.adapter_config)?;
    let policies = load_policies(ctx, payload.tenant_id).await?;

    let stale = FileInfo::new(payload.file_path.clone(), 0, ExposureLevel::Private);
    let file = adapter.get_metadata(&stale).await?;

    let job_id = ctx.repo.create_job(payload.tenant_id, payload.target_id, ScanMode::Single).await?;
    ctx.repo.mark_job_running(payload.tenant_id, job_id).await?;

    let result = crate::pipeline_runner::process_one_file(adapter.as_ref(), &ctx.detection, &policies, &file).await;
    ctx.repo.insert_scan_result(payload.tenant_id, job_id, &result).await?;

    let mut totals = crate::types::ScanTotals::default();
    totals.files_scanned = 1;
    if !result.entity_counts.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        totals.files_with_pii = 1;
    }
    ctx.repo.add_job_counters(payload.tenant_id, job_id, &totals).await?;

    ctx.repo.mark_job_completed(payload.tenant_id, job_id).await?;
    crate::summary::write_summary(&ctx.repo, payload.tenant_id, job_id).await?;
    maybe_export_scan(ctx, job_id).await;

    info!(job_id = %job_id, file_path = %payload.file_path, "scan-trigger rescan completed");
    Ok(())
}

/// Registers all handlers on an executor. The `scan` job type's payload is
/// the one the scheduler and any manual "run now" API enqueue;
/// `scan_partition`/`scan_aggregate` are internal, produced only by
/// `run_scan_job` above; `scan_file` is produced only by the event
/// harvester's scan-trigger hook (§4.G).
pub async fn register_handlers(executor: &openlabels_core::jobs::JobExecutor, ctx: Arc<OrchestratorContext>) {
    executor.register_handler(Arc::new(ScanJobHandler { ctx: Arc::clone(&ctx) })).await;
    executor.register_handler(Arc::new(ScanPartitionHandler { ctx: Arc::clone(&ctx) })).await;
    executor.register_handler(Arc::new(ScanAggregatorHandler { ctx: Arc::clone(&ctx) })).await;
    executor.register_handler(Arc::new(ScanFileHandler { ctx })).await;
}
