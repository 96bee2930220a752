//! Tenant-scoped persistence for the scan orchestrator. Every method takes
//! `tenant_id` as its first argument and folds it into the `WHERE` clause —
//! the same row-level isolation discipline as the rest of the core (§3
//! "Tenant isolation model"), rather than a schema-per-tenant pool switch.

use crate::types::{
    NewScanResult, PartitionSpec, ScanJobRow, ScanMode, ScanPartitionRow, ScanStatus,
    ScanTargetRow, ScanTotals,
};
use chrono::{DateTime, Utc};
use openlabels_core::audit::{AuditBackend, DatabaseAuditRepository};
use openlabels_core::error::{Error, ErrorCode, ErrorMetrics, Result};
use openlabels_core::AuditLogger;
use openlabels_scoring::Policy;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

pub struct ScanRepository {
    pool: PgPool,
    audit: AuditLogger,
}

impl ScanRepository {
    pub fn new(pool: PgPool) -> Self {
        let backend: Arc<dyn AuditBackend> = Arc::new(DatabaseAuditRepository::new(Arc::new(pool.clone())));
        let audit = AuditLogger::new(backend, Arc::new(ErrorMetrics::new()));
        Self { pool, audit }
    }

    /// Exposes the pool to collaborators that need to query tables this
    /// repository doesn't own (the SIEM export engine's post-scan fetch).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Looks up `id` in `table` ignoring tenant scope. If it belongs to a
    /// different tenant than the caller, emits an `idor_attempt` audit event
    /// (§7) before the caller returns its uniform `ResourceNotFound` — the
    /// caller-visible response never distinguishes "missing" from
    /// "owned by someone else".
    async fn audit_if_cross_tenant(&self, resource_type: &str, table: &str, id: Uuid, tenant_id: Uuid) {
        let query = format!("SELECT tenant_id FROM {table} WHERE id = $1");
        let owner: Option<Uuid> = match sqlx::query_scalar(&query).bind(id).fetch_optional(&self.pool).await {
            Ok(owner) => owner,
            Err(err) => {
                tracing::warn!(error = %err, table, "cross-tenant audit lookup failed");
                return;
            }
        };

        if let Some(owner) = owner {
            if owner != tenant_id {
                let _ = self
                    .audit
                    .log_idor_attempt(resource_type, &id.to_string(), &owner.to_string())
                    .await;
            }
        }
    }

    pub async fn load_target(&self, tenant_id: Uuid, target_id: Uuid) -> Result<ScanTargetRow> {
        let row = sqlx::query(
            "SELECT id, tenant_id, adapter_kind, adapter_config FROM scan_targets \
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(target_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.audit_if_cross_tenant("scan_target", "scan_targets", target_id, tenant_id).await;
            return Err(Error::new(ErrorCode::ResourceNotFound, "scan target not found"));
        };

        Ok(ScanTargetRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            adapter_kind: row.try_get("adapter_kind")?,
            adapter_config: row.try_get("adapter_config")?,
        })
    }

    pub async fn create_job(&self, tenant_id: Uuid, target_id: Uuid, mode: ScanMode) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO scan_jobs (tenant_id, target_id, status, scan_mode) \
             VALUES ($1, $2, 'pending', $3) RETURNING id",
        )
        .bind(tenant_id)
        .bind(target_id)
        .bind(mode.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn mark_job_running(&self, tenant_id: Uuid, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE scan_jobs SET status = 'running', started_at = now() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_job_completed(&self, tenant_id: Uuid, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE scan_jobs SET status = 'completed', completed_at = now() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_job_failed(&self, tenant_id: Uuid, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE scan_jobs SET status = 'failed', completed_at = now() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Observed by the orchestrator at the start of every file (§4.F
    /// "Cancellation").
    pub async fn is_job_cancelled(&self, tenant_id: Uuid, job_id: Uuid) -> Result<bool> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM scan_jobs WHERE id = $1 AND tenant_id = $2")
                .bind(job_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status.as_deref() == Some("cancelled"))
    }

    pub async fn load_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<ScanJobRow> {
        let row = sqlx::query(
            "SELECT id, tenant_id, target_id, status, scan_mode, total_partitions, \
                    partitions_completed, partitions_failed, files_scanned, \
                    files_with_pii, total_entities, created_at, started_at \
             FROM scan_jobs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.audit_if_cross_tenant("scan_job", "scan_jobs", job_id, tenant_id).await;
            return Err(Error::new(ErrorCode::ResourceNotFound, "scan job not found"));
        };

        let scan_mode: String = row.try_get("scan_mode")?;
        let status: String = row.try_get("status")?;

        Ok(ScanJobRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            target_id: row.try_get("target_id")?,
            status: ScanStatus::from_str(&status),
            scan_mode: if scan_mode == "fanout" {
                ScanMode::Fanout
            } else {
                ScanMode::Single
            },
            total_partitions: row.try_get("total_partitions")?,
            partitions_completed: row.try_get("partitions_completed")?,
            partitions_failed: row.try_get("partitions_failed")?,
            files_scanned: row.try_get("files_scanned")?,
            files_with_pii: row.try_get("files_with_pii")?,
            total_entities: row.try_get("total_entities")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
        })
    }

    /// Flushes accumulated counters onto `scan_jobs` (§4.F batched counter
    /// updates).
    pub async fn add_job_counters(&self, tenant_id: Uuid, job_id: Uuid, totals: &ScanTotals) -> Result<()> {
        if totals.files_scanned == 0 && totals.files_with_pii == 0 && totals.total_entities == 0 {
            return Ok(());
        }
        sqlx::query(
            "UPDATE scan_jobs SET files_scanned = files_scanned + $3, \
                    files_with_pii = files_with_pii + $4, total_entities = total_entities + $5 \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .bind(totals.files_scanned as i64)
        .bind(totals.files_with_pii as i64)
        .bind(totals.total_entities as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_scan_result(&self, tenant_id: Uuid, job_id: Uuid, result: &NewScanResult) -> Result<()> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO scan_results (tenant_id, job_id, file_path, file_name, file_size, \
                    content_hash, risk_score, risk_tier, entity_counts, exposure_level, \
                    policy_violations, scan_error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
        )
        .bind(tenant_id)
        .bind(job_id)
        .bind(&result.file_path)
        .bind(&result.file_name)
        .bind(result.file_size)
        .bind(&result.content_hash)
        .bind(result.risk_score)
        .bind(&result.risk_tier)
        .bind(&result.entity_counts)
        .bind(&result.exposure_level)
        .bind(&result.policy_violations)
        .bind(&result.scan_error)
        .fetch_one(&self.pool)
        .await?;

        self.dispatch_remediation_actions(tenant_id, id, &result.policy_violations).await
    }

    /// Records one `remediation_actions` row per matched policy (§4.C
    /// "results feed into downstream action dispatch"). `policy_violations`
    /// is the `Vec<PolicyMatch>` serialized onto the result row; actually
    /// executing the action (quarantine, label, notify) is out of core scope.
    async fn dispatch_remediation_actions(
        &self,
        tenant_id: Uuid,
        scan_result_id: Uuid,
        policy_violations: &serde_json::Value,
    ) -> Result<()> {
        let Some(matches) = policy_violations.as_array() else {
            return Ok(());
        };
        for m in matches {
            let policy_id = m.get("policy_id").and_then(|v| v.as_str()).unwrap_or_default();
            let policy_name = m.get("policy_name").and_then(|v| v.as_str()).unwrap_or_default();
            let framework = m.get("framework").and_then(|v| v.as_str()).unwrap_or_default();
            let severity = m.get("severity").and_then(|v| v.as_str()).unwrap_or_default();

            sqlx::query(
                "INSERT INTO remediation_actions \
                    (tenant_id, scan_result_id, policy_id, policy_name, framework, severity, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, 'pending')",
            )
            .bind(tenant_id)
            .bind(scan_result_id)
            .bind(policy_id)
            .bind(policy_name)
            .bind(framework)
            .bind(severity)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn insert_scan_summary(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        tier_counts: serde_json::Value,
        top_entity_types: serde_json::Value,
        duration_seconds: f64,
        label_stats: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO scan_summaries (tenant_id, job_id, tier_counts, top_entity_types, \
                    duration_seconds, label_stats) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (job_id) DO UPDATE SET tier_counts = EXCLUDED.tier_counts, \
                    top_entity_types = EXCLUDED.top_entity_types, \
                    duration_seconds = EXCLUDED.duration_seconds, \
                    label_stats = EXCLUDED.label_stats",
        )
        .bind(tenant_id)
        .bind(job_id)
        .bind(tier_counts)
        .bind(top_entity_types)
        .bind(duration_seconds)
        .bind(label_stats)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_total_partitions(&self, tenant_id: Uuid, job_id: Uuid, total: i32) -> Result<()> {
        sqlx::query("UPDATE scan_jobs SET total_partitions = $3 WHERE id = $1 AND tenant_id = $2")
            .bind(job_id)
            .bind(tenant_id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_partition(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        spec: &PartitionSpec,
    ) -> Result<Uuid> {
        let spec_json = serde_json::to_value(spec)
            .map_err(|e| Error::new(ErrorCode::SerializationError, e.to_string()))?;
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO scan_partitions (tenant_id, job_id, status, partition_spec) \
             VALUES ($1, $2, 'pending', $3) RETURNING id",
        )
        .bind(tenant_id)
        .bind(job_id)
        .bind(spec_json)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn load_partition(&self, tenant_id: Uuid, partition_id: Uuid) -> Result<ScanPartitionRow> {
        let row = sqlx::query(
            "SELECT id, tenant_id, job_id, status, partition_spec, retry_count, last_processed_path \
             FROM scan_partitions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(partition_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.audit_if_cross_tenant("scan_partition", "scan_partitions", partition_id, tenant_id).await;
            return Err(Error::new(ErrorCode::ResourceNotFound, "scan partition not found"));
        };

        let status: String = row.try_get("status")?;
        let spec_json: serde_json::Value = row.try_get("partition_spec")?;
        let partition_spec: PartitionSpec = serde_json::from_value(spec_json)
            .map_err(|e| Error::new(ErrorCode::SerializationError, e.to_string()))?;

        Ok(ScanPartitionRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            job_id: row.try_get("job_id")?,
            status: ScanStatus::from_str(&status),
            partition_spec,
            retry_count: row.try_get("retry_count")?,
            last_processed_path: row.try_get("last_processed_path")?,
        })
    }

    pub async fn mark_partition_running(&self, tenant_id: Uuid, partition_id: Uuid, worker_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scan_partitions SET status = 'running', worker_id = $3 \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(partition_id)
        .bind(tenant_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks the partition completed and bumps the owning job's
    /// `partitions_completed` counter in one statement.
    pub async fn mark_partition_completed(&self, tenant_id: Uuid, job_id: Uuid, partition_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE scan_partitions SET status = 'completed' WHERE id = $1 AND tenant_id = $2")
            .bind(partition_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE scan_jobs SET partitions_completed = partitions_completed + 1 \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Increments `retry_count`; if it has exhausted `max_retries` the
    /// partition is marked permanently `failed` and the job's
    /// `partitions_failed` counter is bumped (§4.F "Failure semantics" — a
    /// failed partition does not fail the job). Returns `true` if the
    /// partition is now terminal.
    pub async fn mark_partition_retry_or_failed(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        partition_id: Uuid,
        max_retries: i32,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let retry_count: i32 = sqlx::query_scalar(
            "UPDATE scan_partitions SET retry_count = retry_count + 1 \
             WHERE id = $1 AND tenant_id = $2 RETURNING retry_count",
        )
        .bind(partition_id)
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        let exhausted = retry_count >= max_retries;
        if exhausted {
            sqlx::query("UPDATE scan_partitions SET status = 'failed' WHERE id = $1 AND tenant_id = $2")
                .bind(partition_id)
                .bind(tenant_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "UPDATE scan_jobs SET partitions_failed = partitions_failed + 1 \
                 WHERE id = $1 AND tenant_id = $2",
            )
            .bind(job_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE scan_partitions SET status = 'pending' WHERE id = $1 AND tenant_id = $2")
                .bind(partition_id)
                .bind(tenant_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(exhausted)
    }

    pub async fn update_partition_cursor(
        &self,
        tenant_id: Uuid,
        partition_id: Uuid,
        last_processed_path: &str,
        files_scanned_delta: u64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE scan_partitions SET last_processed_path = $3, \
                    files_scanned = files_scanned + $4 \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(partition_id)
        .bind(tenant_id)
        .bind(last_processed_path)
        .bind(files_scanned_delta as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `(partitions_completed + partitions_failed, total_partitions)` as
    /// recorded on the job row, for the aggregator's terminal check.
    pub async fn partition_progress(&self, tenant_id: Uuid, job_id: Uuid) -> Result<(i32, i32, i32)> {
        let row = sqlx::query(
            "SELECT partitions_completed, partitions_failed, total_partitions \
             FROM scan_jobs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(job_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::new(ErrorCode::ResourceNotFound, "scan job not found"))?;

        Ok((
            row.try_get("partitions_completed")?,
            row.try_get("partitions_failed")?,
            row.try_get("total_partitions")?,
        ))
    }

    pub async fn load_enabled_policies(&self, tenant_id: Uuid) -> Result<Vec<Policy>> {
        let rows = sqlx::query(
            "SELECT id, name, framework, risk_level, config FROM policies \
             WHERE tenant_id = $1 AND enabled = true",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let framework: String = row.try_get("framework")?;
            let risk_level: String = row.try_get("risk_level")?;
            let config: serde_json::Value = row.try_get("config")?;

            #[derive(serde::Deserialize)]
            struct PolicyConfig {
                triggers: Vec<openlabels_scoring::Trigger>,
            }
            let parsed: PolicyConfig = serde_json::from_value(config)
                .map_err(|e| Error::new(ErrorCode::SerializationError, e.to_string()))?;

            policies.push(Policy {
                id: id.to_string(),
                name,
                framework,
                risk_level,
                enabled: true,
                triggers: parsed.triggers,
            });
        }
        Ok(policies)
    }

    /// Pre-aggregates tier counts and the top entity types observed for a
    /// completed job, straight from the persisted `scan_results` rows rather
    /// than threaded through memory — the only approach that works once a
    /// fan-out job's partitions have run as separate, possibly
    /// different-process, queued jobs.
    pub async fn compute_summary_stats(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<(serde_json::Value, serde_json::Value)> {
        let tier_rows = sqlx::query("SELECT risk_tier, count(*) AS n FROM scan_results WHERE tenant_id = $1 AND job_id = $2 GROUP BY risk_tier")
            .bind(tenant_id)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;

        let mut tier_counts = serde_json::Map::new();
        for row in tier_rows {
            let tier: String = row.try_get("risk_tier")?;
            let count: i64 = row.try_get("n")?;
            tier_counts.insert(tier, serde_json::json!(count));
        }

        let entity_rows = sqlx::query(
            "SELECT key, sum(value::text::int) AS n FROM scan_results, jsonb_each_text(entity_counts) \
             WHERE tenant_id = $1 AND job_id = $2 GROUP BY key ORDER BY n DESC LIMIT 10",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let mut top_entity_types = Vec::new();
        for row in entity_rows {
            let entity_type: String = row.try_get("key")?;
            let count: i64 = row.try_get("n")?;
            top_entity_types.push(serde_json::json!({"entity_type": entity_type, "count": count}));
        }

        Ok((serde_json::Value::Object(tier_counts), serde_json::Value::Array(top_entity_types)))
    }

    pub async fn oldest_started_at(&self, tenant_id: Uuid, job_id: Uuid) -> Result<DateTime<Utc>> {
        let started_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT started_at FROM scan_jobs WHERE id = $1 AND tenant_id = $2")
                .bind(job_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
        Ok(started_at.unwrap_or_else(Utc::now))
    }
}
