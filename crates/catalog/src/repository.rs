//! Per-table, per-tenant cursor tracking plus the row-selection queries the
//! writer folds into Arrow record batches (§4.H step 1).
//!
//! Cursor comparisons use a `(time_col, id)` tuple rather than `time_col`
//! alone so that rows sharing one timestamp still get a strict total order
//! — without it, two rows landing in the same millisecond could leapfrog
//! each other across flush cycles and one would never be selected.

use crate::tables::CatalogTable;
use crate::types::{
    AuditLogRow, CatalogCursor, FileAccessEventRow, MonitoredFileRow, RemediationActionRow,
    ScanResultRow,
};
use openlabels_core::error::Result;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

pub struct CatalogCursorRepository;

impl CatalogCursorRepository {
    pub async fn load_cursor(
        tx: &mut Transaction<'_, Postgres>,
        table: CatalogTable,
        tenant_id: Uuid,
    ) -> Result<CatalogCursor> {
        let row: Option<(Option<Uuid>, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT last_id, last_time FROM catalog_cursors WHERE table_name = $1 AND tenant_id = $2",
        )
        .bind(table.name())
        .bind(tenant_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(match row {
            Some((last_id, last_time)) => CatalogCursor {
                last_id: last_id.unwrap_or_else(Uuid::nil),
                last_time,
            },
            None => CatalogCursor::epoch(),
        })
    }

    /// Advances the cursor unconditionally; the caller only reaches this
    /// after the Parquet write for the batch it covers has already
    /// succeeded (§4.H "Failure semantics").
    pub async fn advance_cursor(
        tx: &mut Transaction<'_, Postgres>,
        table: CatalogTable,
        tenant_id: Uuid,
        cursor: CatalogCursor,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO catalog_cursors (table_name, tenant_id, last_id, last_time) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (table_name, tenant_id) \
             DO UPDATE SET last_id = EXCLUDED.last_id, last_time = EXCLUDED.last_time",
        )
        .bind(table.name())
        .bind(tenant_id)
        .bind(cursor.last_id)
        .bind(cursor.last_time)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// One page of newly committed rows read from a source table, already past
/// `cursor` in `(time_col, id)` order.
pub enum CatalogRows {
    ScanResults(Vec<ScanResultRow>),
    FileAccessEvents(Vec<FileAccessEventRow>),
    AuditLog(Vec<AuditLogRow>),
    MonitoredFiles(Vec<MonitoredFileRow>),
    RemediationActions(Vec<RemediationActionRow>),
}

impl CatalogRows {
    pub fn len(&self) -> usize {
        match self {
            CatalogRows::ScanResults(rows) => rows.len(),
            CatalogRows::FileAccessEvents(rows) => rows.len(),
            CatalogRows::AuditLog(rows) => rows.len(),
            CatalogRows::MonitoredFiles(rows) => rows.len(),
            CatalogRows::RemediationActions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The partition date key (`YYYY-MM-DD`, UTC) of each row, in the same
    /// order the rows were selected in. Rows are selected in ascending
    /// `(time_col, id)` order, so this sequence is non-decreasing and the
    /// writer can group same-date runs into contiguous slices.
    pub fn date_keys(&self) -> Vec<String> {
        const FMT: &str = "%Y-%m-%d";
        match self {
            CatalogRows::ScanResults(rows) => {
                rows.iter().map(|r| r.scanned_at.format(FMT).to_string()).collect()
            }
            CatalogRows::FileAccessEvents(rows) => {
                rows.iter().map(|r| r.event_time.format(FMT).to_string()).collect()
            }
            CatalogRows::AuditLog(rows) => {
                rows.iter().map(|r| r.event_time.format(FMT).to_string()).collect()
            }
            CatalogRows::MonitoredFiles(rows) => {
                rows.iter().map(|r| r.registered_at.format(FMT).to_string()).collect()
            }
            CatalogRows::RemediationActions(rows) => {
                rows.iter().map(|r| r.created_at.format(FMT).to_string()).collect()
            }
        }
    }

    /// The `(id, time)` of the last row, in selection order, used to advance
    /// the cursor after a successful write.
    pub fn last_cursor(&self) -> Option<CatalogCursor> {
        match self {
            CatalogRows::ScanResults(rows) => rows.last().map(|r| CatalogCursor {
                last_id: r.id,
                last_time: r.scanned_at,
            }),
            CatalogRows::FileAccessEvents(rows) => rows.last().map(|r| CatalogCursor {
                last_id: r.id,
                last_time: r.event_time,
            }),
            CatalogRows::AuditLog(rows) => rows.last().map(|r| CatalogCursor {
                last_id: Uuid::parse_str(&r.id).unwrap_or_else(|_| Uuid::nil()),
                last_time: r.event_time,
            }),
            CatalogRows::MonitoredFiles(rows) => rows.last().map(|r| CatalogCursor {
                last_id: r.id,
                last_time: r.registered_at,
            }),
            CatalogRows::RemediationActions(rows) => rows.last().map(|r| CatalogCursor {
                last_id: r.id,
                last_time: r.created_at,
            }),
        }
    }
}

pub struct CatalogSourceRepository;

impl CatalogSourceRepository {
    pub async fn select_rows(
        tx: &mut Transaction<'_, Postgres>,
        table: CatalogTable,
        tenant_id: Uuid,
        cursor: CatalogCursor,
        batch_size: i64,
    ) -> Result<CatalogRows> {
        Ok(match table {
            CatalogTable::ScanResults => CatalogRows::ScanResults(
                sqlx::query_as::<_, ScanResultRow>(
                    "SELECT id, tenant_id, job_id, file_path, file_name, file_size, \
                            content_hash, risk_score, risk_tier, entity_counts, \
                            exposure_level, policy_violations, scan_error, scanned_at \
                     FROM scan_results \
                     WHERE tenant_id = $1 AND (scanned_at, id) > ($2, $3) \
                     ORDER BY scanned_at, id LIMIT $4",
                )
                .bind(tenant_id)
                .bind(cursor.last_time)
                .bind(cursor.last_id)
                .bind(batch_size)
                .fetch_all(&mut **tx)
                .await?,
            ),
            CatalogTable::FileAccessEvents => CatalogRows::FileAccessEvents(
                sqlx::query_as::<_, FileAccessEventRow>(
                    "SELECT id, tenant_id, file_path, action, user_name, process_name, \
                            event_time, event_source \
                     FROM file_access_events \
                     WHERE tenant_id = $1 AND (event_time, id) > ($2, $3) \
                     ORDER BY event_time, id LIMIT $4",
                )
                .bind(tenant_id)
                .bind(cursor.last_time)
                .bind(cursor.last_id)
                .bind(batch_size)
                .fetch_all(&mut **tx)
                .await?,
            ),
            CatalogTable::AuditLog => CatalogRows::AuditLog(
                sqlx::query_as::<_, AuditLogRow>(
                    "SELECT id, event_type, severity, event_time, actor_id, impersonator_id, \
                            tenant_id, request_id, resource_type, resource_id, source_ip, \
                            user_agent, description, outcome, tags, created_at \
                     FROM audit_log \
                     WHERE tenant_id = $1 AND (event_time, id::uuid) > ($2, $3) \
                     ORDER BY event_time, id LIMIT $4",
                )
                .bind(tenant_id)
                .bind(cursor.last_time)
                .bind(cursor.last_id)
                .bind(batch_size)
                .fetch_all(&mut **tx)
                .await?,
            ),
            CatalogTable::MonitoredFiles => CatalogRows::MonitoredFiles(
                sqlx::query_as::<_, MonitoredFileRow>(
                    "SELECT id, tenant_id, target_id, file_path, registered_at \
                     FROM monitored_files \
                     WHERE tenant_id = $1 AND (registered_at, id) > ($2, $3) \
                     ORDER BY registered_at, id LIMIT $4",
                )
                .bind(tenant_id)
                .bind(cursor.last_time)
                .bind(cursor.last_id)
                .bind(batch_size)
                .fetch_all(&mut **tx)
                .await?,
            ),
            CatalogTable::RemediationActions => CatalogRows::RemediationActions(
                sqlx::query_as::<_, RemediationActionRow>(
                    "SELECT id, tenant_id, scan_result_id, policy_id, policy_name, framework, \
                            severity, status, created_at \
                     FROM remediation_actions \
                     WHERE tenant_id = $1 AND (created_at, id) > ($2, $3) \
                     ORDER BY created_at, id LIMIT $4",
                )
                .bind(tenant_id)
                .bind(cursor.last_time)
                .bind(cursor.last_id)
                .bind(batch_size)
                .fetch_all(&mut **tx)
                .await?,
            ),
        })
    }
}
