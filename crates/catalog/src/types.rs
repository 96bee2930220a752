//! Row shapes the catalog repository decodes from each source table before
//! handing them to the matching `tables::CatalogTable` Arrow builder.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanResultRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub risk_score: i16,
    pub risk_tier: String,
    pub entity_counts: Value,
    pub exposure_level: String,
    pub policy_violations: Value,
    pub scan_error: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileAccessEventRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub file_path: String,
    pub action: String,
    pub user_name: Option<String>,
    pub process_name: Option<String>,
    pub event_time: DateTime<Utc>,
    pub event_source: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditLogRow {
    pub id: String,
    pub event_type: String,
    pub severity: String,
    pub event_time: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub impersonator_id: Option<String>,
    pub tenant_id: Option<Uuid>,
    pub request_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub description: String,
    pub outcome: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonitoredFileRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub target_id: Uuid,
    pub file_path: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RemediationActionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub scan_result_id: Option<Uuid>,
    pub policy_id: String,
    pub policy_name: String,
    pub framework: String,
    pub severity: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// The per-table cursor position, advanced only after a successful flush.
/// `last_id` defaults to the nil UUID rather than `NULL` so the `(time, id)`
/// tuple comparison in the row-selection query behaves the same on the very
/// first cycle as on every subsequent one.
#[derive(Debug, Clone, Copy)]
pub struct CatalogCursor {
    pub last_id: Uuid,
    pub last_time: DateTime<Utc>,
}

impl CatalogCursor {
    pub fn epoch() -> Self {
        Self {
            last_id: Uuid::nil(),
            last_time: DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"),
        }
    }
}
