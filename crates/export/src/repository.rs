//! `export_cursors` persistence and the source-table queries that feed the
//! periodic export loop (§4.I, §3 "ExportCursor").

use crate::record::{AccessEventExportRow, ExportRecord, ScanResultExportRow};
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;
use sqlx::PgPool;

/// Rows fetched per table per periodic-export cycle. Keeps one export cycle
/// from holding an unbounded result set in memory for a tenant with a very
/// active scan history.
const FETCH_BATCH: i64 = 1000;

pub struct ExportCursorRepository;

impl ExportCursorRepository {
    pub async fn load_cursor(pool: &PgPool, sink_name: &str) -> Result<Option<DateTime<Utc>>> {
        let cursor: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT cursor_time FROM export_cursors WHERE sink_name = $1")
                .bind(sink_name)
                .fetch_optional(pool)
                .await?;
        Ok(cursor)
    }

    /// Advances the cursor unconditionally; the caller only reaches this
    /// after `export_batch` reports every submitted record was ingested
    /// (§4.I "Cursors only advance on `count_sent == count_submitted`").
    pub async fn advance_cursor(pool: &PgPool, sink_name: &str, cursor: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO export_cursors (sink_name, cursor_time) VALUES ($1, $2) \
             ON CONFLICT (sink_name) DO UPDATE SET cursor_time = EXCLUDED.cursor_time",
        )
        .bind(sink_name)
        .bind(cursor)
        .execute(pool)
        .await?;
        Ok(())
    }
}

pub struct ExportSourceRepository;

impl ExportSourceRepository {
    /// Selects `scan_results` rows newer than `since`, across every tenant —
    /// SIEM sinks are a deployment-wide destination, not a per-tenant one, so
    /// this intentionally has no `tenant_id` filter (contrast with the
    /// catalog writer, which flushes one tenant at a time).
    pub async fn scan_results_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<ExportRecord>> {
        let rows: Vec<ScanResultExportRow> = sqlx::query_as(
            "SELECT tenant_id, file_path, risk_score, risk_tier, entity_counts, \
                    policy_violations, scanned_at \
             FROM scan_results WHERE scanned_at > $1 ORDER BY scanned_at LIMIT $2",
        )
        .bind(since)
        .bind(FETCH_BATCH)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ExportRecord::from).collect())
    }

    pub async fn access_events_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<ExportRecord>> {
        let rows: Vec<AccessEventExportRow> = sqlx::query_as(
            "SELECT tenant_id, file_path, action, user_name, event_time, event_source \
             FROM file_access_events WHERE event_time > $1 ORDER BY event_time LIMIT $2",
        )
        .bind(since)
        .bind(FETCH_BATCH)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ExportRecord::from).collect())
    }

    /// All results belonging to one completed scan job, for the `post_scan`
    /// export mode (§4.I `export_scan`).
    pub async fn scan_results_for_job(pool: &PgPool, job_id: uuid::Uuid) -> Result<Vec<ExportRecord>> {
        let rows: Vec<ScanResultExportRow> = sqlx::query_as(
            "SELECT tenant_id, file_path, risk_score, risk_tier, entity_counts, \
                    policy_violations, scanned_at \
             FROM scan_results WHERE job_id = $1 ORDER BY scanned_at",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ExportRecord::from).collect())
    }
}
