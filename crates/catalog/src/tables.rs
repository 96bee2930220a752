//! The five operational-store tables the catalog writer mirrors into
//! Parquet (§4.H), and the fixed Arrow schema each one flushes to.
//!
//! UUIDs go out as `FixedSizeBinary(16)`, timestamps as
//! `Timestamp(Millisecond, UTC)`, and low-cardinality string columns as
//! dictionary-encoded `Utf8` — matching §6's persisted-state layout rather
//! than letting each table pick its own encoding.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

/// One of the five source tables the catalog writer flushes. Order here is
/// the order `CatalogWriter::run_once` visits them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    ScanResults,
    FileAccessEvents,
    AuditLog,
    MonitoredFiles,
    RemediationActions,
}

impl CatalogTable {
    pub const ALL: [CatalogTable; 5] = [
        CatalogTable::ScanResults,
        CatalogTable::FileAccessEvents,
        CatalogTable::AuditLog,
        CatalogTable::MonitoredFiles,
        CatalogTable::RemediationActions,
    ];

    /// Name used both as the catalog path prefix and the `catalog_cursors`
    /// row key — must match the operational-store table name.
    pub fn name(self) -> &'static str {
        match self {
            CatalogTable::ScanResults => "scan_results",
            CatalogTable::FileAccessEvents => "file_access_events",
            CatalogTable::AuditLog => "audit_log",
            CatalogTable::MonitoredFiles => "monitored_files",
            CatalogTable::RemediationActions => "remediation_actions",
        }
    }

    /// Column the Hive `{date_column}=YYYY-MM-DD` partition segment is
    /// derived from, also the cursor's ordering column.
    pub fn date_column(self) -> &'static str {
        match self {
            CatalogTable::ScanResults => "scanned_at",
            CatalogTable::FileAccessEvents => "event_time",
            CatalogTable::AuditLog => "event_time",
            CatalogTable::MonitoredFiles => "registered_at",
            CatalogTable::RemediationActions => "created_at",
        }
    }

    pub fn schema(self) -> SchemaRef {
        let ts = DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()));
        let uuid16 = DataType::FixedSizeBinary(16);
        let dict = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));

        let fields: Vec<Field> = match self {
            CatalogTable::ScanResults => vec![
                Field::new("id", uuid16.clone(), false),
                Field::new("tenant_id", uuid16.clone(), false),
                Field::new("job_id", uuid16.clone(), false),
                Field::new("file_path", DataType::Utf8, false),
                Field::new("file_name", DataType::Utf8, false),
                Field::new("file_size", DataType::Int64, false),
                Field::new("content_hash", DataType::Utf8, true),
                Field::new("risk_score", DataType::Int16, false),
                Field::new("risk_tier", dict.clone(), false),
                Field::new("entity_counts", entity_counts_type(), false),
                Field::new("exposure_level", dict.clone(), false),
                Field::new("policy_violations", DataType::Utf8, false),
                Field::new("scan_error", DataType::Utf8, true),
                Field::new("scanned_at", ts.clone(), false),
            ],
            CatalogTable::FileAccessEvents => vec![
                Field::new("id", uuid16.clone(), false),
                Field::new("tenant_id", uuid16.clone(), false),
                Field::new("file_path", DataType::Utf8, false),
                Field::new("action", dict.clone(), false),
                Field::new("user_name", DataType::Utf8, true),
                Field::new("process_name", DataType::Utf8, true),
                Field::new("event_time", ts.clone(), false),
                Field::new("event_source", dict.clone(), false),
            ],
            CatalogTable::AuditLog => vec![
                Field::new("id", DataType::Utf8, false),
                Field::new("event_type", dict.clone(), false),
                Field::new("severity", dict.clone(), false),
                Field::new("event_time", ts.clone(), false),
                Field::new("actor_id", DataType::Utf8, true),
                Field::new("impersonator_id", DataType::Utf8, true),
                Field::new("tenant_id", uuid16.clone(), true),
                Field::new("request_id", DataType::Utf8, true),
                Field::new("resource_type", DataType::Utf8, true),
                Field::new("resource_id", DataType::Utf8, true),
                Field::new("source_ip", DataType::Utf8, true),
                Field::new("user_agent", DataType::Utf8, true),
                Field::new("description", DataType::Utf8, false),
                Field::new("outcome", dict.clone(), false),
                Field::new(
                    "tags",
                    DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                    false,
                ),
                Field::new("created_at", ts.clone(), false),
            ],
            CatalogTable::MonitoredFiles => vec![
                Field::new("id", uuid16.clone(), false),
                Field::new("tenant_id", uuid16.clone(), false),
                Field::new("target_id", uuid16.clone(), false),
                Field::new("file_path", DataType::Utf8, false),
                Field::new("registered_at", ts.clone(), false),
            ],
            CatalogTable::RemediationActions => vec![
                Field::new("id", uuid16.clone(), false),
                Field::new("tenant_id", uuid16.clone(), false),
                Field::new("scan_result_id", uuid16, true),
                Field::new("policy_id", DataType::Utf8, false),
                Field::new("policy_name", DataType::Utf8, false),
                Field::new("framework", dict.clone(), false),
                Field::new("severity", dict.clone(), false),
                Field::new("status", dict, false),
                Field::new("created_at", ts, false),
            ],
        };

        Arc::new(Schema::new(fields))
    }
}

fn entity_counts_type() -> DataType {
    let entries = Field::new(
        "entries",
        DataType::Struct(
            vec![
                Field::new("keys", DataType::Utf8, false),
                Field::new("values", DataType::Int32, true),
            ]
            .into(),
        ),
        false,
    );
    DataType::Map(Arc::new(entries), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_name_matches_its_operational_store_table() {
        assert_eq!(CatalogTable::ScanResults.name(), "scan_results");
        assert_eq!(CatalogTable::FileAccessEvents.name(), "file_access_events");
        assert_eq!(CatalogTable::AuditLog.name(), "audit_log");
        assert_eq!(CatalogTable::MonitoredFiles.name(), "monitored_files");
        assert_eq!(CatalogTable::RemediationActions.name(), "remediation_actions");
    }

    #[test]
    fn schema_field_count_matches_the_columns_listed_in_date_column_mapping() {
        assert_eq!(CatalogTable::ScanResults.schema().fields().len(), 14);
        assert_eq!(CatalogTable::FileAccessEvents.schema().fields().len(), 8);
        assert_eq!(CatalogTable::AuditLog.schema().fields().len(), 16);
        assert_eq!(CatalogTable::MonitoredFiles.schema().fields().len(), 5);
        assert_eq!(CatalogTable::RemediationActions.schema().fields().len(), 9);
    }
}
