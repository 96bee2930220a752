//! Domain shapes for the scan orchestrator (§4.F), mirrored from the
//! `scan_jobs`/`scan_partitions` tables in `sql/schema.sql`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Single,
    Fanout,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Single => "single",
            ScanMode::Fanout => "fanout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "running" => ScanStatus::Running,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            "cancelled" => ScanStatus::Cancelled,
            _ => ScanStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }
}

/// One partition's slice of work. Cloud adapters and the filesystem adapter
/// both page through `FileInfo::cursor`, so a partition is defined purely in
/// terms of that cursor rather than a source-specific prefix/range scheme:
/// "start enumerating at `start_cursor`, stop after roughly `max_files`".
/// `max_files` is advisory — a partition worker also stops at the adapter's
/// own `is_last_page` signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionSpec {
    CursorRange {
        start_cursor: Option<String>,
        max_files: u64,
    },
}

#[derive(Debug, Clone)]
pub struct ScanTargetRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub adapter_kind: String,
    pub adapter_config: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ScanJobRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub target_id: Uuid,
    pub status: ScanStatus,
    pub scan_mode: ScanMode,
    pub total_partitions: i32,
    pub partitions_completed: i32,
    pub partitions_failed: i32,
    pub files_scanned: i64,
    pub files_with_pii: i64,
    pub total_entities: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ScanPartitionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub status: ScanStatus,
    pub partition_spec: PartitionSpec,
    pub retry_count: i32,
    pub last_processed_path: Option<String>,
}

/// Running totals accumulated while walking one job or partition, flushed to
/// the `scan_jobs` counters in batches rather than after every file (§4.F
/// "update job counters in batches of 100").
#[derive(Debug, Clone, Default)]
pub struct ScanTotals {
    pub files_scanned: u64,
    pub files_with_pii: u64,
    pub total_entities: u64,
    pub last_processed_path: Option<String>,
}

impl ScanTotals {
    pub fn merge(&mut self, other: &ScanTotals) {
        self.files_scanned += other.files_scanned;
        self.files_with_pii += other.files_with_pii;
        self.total_entities += other.total_entities;
        if other.last_processed_path.is_some() {
            self.last_processed_path = other.last_processed_path.clone();
        }
    }
}

/// One file's outcome, ready to become a `scan_results` row.
#[derive(Debug, Clone)]
pub struct NewScanResult {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub risk_score: i16,
    pub risk_tier: String,
    pub entity_counts: serde_json::Value,
    pub exposure_level: String,
    pub policy_violations: serde_json::Value,
    pub scan_error: Option<String>,
}
