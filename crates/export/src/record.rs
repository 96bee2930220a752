//! SIEM-agnostic normalized record (§4.I) and the conversions that build it
//! from the operational store's `scan_results` and `file_access_events` rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One finding (scan result, access event, or policy violation) in a
/// SIEM-agnostic shape. Sink adapters map this into their platform-native
/// schema; nothing downstream of this type is SIEM-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub record_type: RecordType,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub file_path: String,
    pub risk_score: Option<i16>,
    pub risk_tier: Option<String>,
    pub entity_types: Vec<String>,
    pub entity_counts: serde_json::Map<String, Value>,
    pub policy_violations: Vec<String>,
    pub action_taken: Option<String>,
    pub user: Option<String>,
    pub source_adapter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    ScanResult,
    AccessEvent,
    PolicyViolation,
    AuditLog,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::ScanResult => "scan_result",
            RecordType::AccessEvent => "access_event",
            RecordType::PolicyViolation => "policy_violation",
            RecordType::AuditLog => "audit_log",
        }
    }
}

impl ExportRecord {
    /// Flattens the record into a JSON object, the shape the JSON-framed
    /// sinks (Splunk, Sentinel) embed as their event body.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "record_type": self.record_type.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
            "tenant_id": self.tenant_id.to_string(),
            "file_path": self.file_path,
            "risk_score": self.risk_score,
            "risk_tier": self.risk_tier,
            "entity_types": self.entity_types,
            "entity_counts": self.entity_counts,
            "policy_violations": self.policy_violations,
            "action_taken": self.action_taken,
            "user": self.user,
            "source_adapter": self.source_adapter,
        })
    }
}

/// Row shape selected straight off `scan_results` by `ExportSourceRepository`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanResultExportRow {
    pub tenant_id: Uuid,
    pub file_path: String,
    pub risk_score: i16,
    pub risk_tier: String,
    pub entity_counts: Value,
    pub policy_violations: Value,
    pub scanned_at: DateTime<Utc>,
}

impl From<ScanResultExportRow> for ExportRecord {
    fn from(row: ScanResultExportRow) -> Self {
        let entity_counts = row.entity_counts.as_object().cloned().unwrap_or_default();
        let entity_types = entity_counts.keys().cloned().collect();
        let policy_violations = row
            .policy_violations
            .as_array()
            .map(|matches| {
                matches
                    .iter()
                    .filter_map(|m| m.get("policy_name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ExportRecord {
            record_type: RecordType::ScanResult,
            timestamp: row.scanned_at,
            tenant_id: row.tenant_id,
            file_path: row.file_path,
            risk_score: Some(row.risk_score),
            risk_tier: Some(row.risk_tier),
            entity_types,
            entity_counts,
            policy_violations,
            action_taken: None,
            user: None,
            source_adapter: "filesystem".to_string(),
        }
    }
}

/// Row shape selected straight off `file_access_events`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessEventExportRow {
    pub tenant_id: Uuid,
    pub file_path: String,
    pub action: String,
    pub user_name: Option<String>,
    pub event_time: DateTime<Utc>,
    pub event_source: String,
}

impl From<AccessEventExportRow> for ExportRecord {
    fn from(row: AccessEventExportRow) -> Self {
        ExportRecord {
            record_type: RecordType::AccessEvent,
            timestamp: row.event_time,
            tenant_id: row.tenant_id,
            file_path: row.file_path,
            risk_score: None,
            risk_tier: None,
            entity_types: Vec::new(),
            entity_counts: serde_json::Map::new(),
            policy_violations: Vec::new(),
            action_taken: Some(row.action),
            user: row.user_name,
            source_adapter: row.event_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_result_row_extracts_policy_names_and_entity_types() {
        let row = ScanResultExportRow {
            tenant_id: Uuid::nil(),
            file_path: "/data/patients.csv".to_string(),
            risk_score: 72,
            risk_tier: "HIGH".to_string(),
            entity_counts: serde_json::json!({"SSN": 2, "NAME": 1}),
            policy_violations: serde_json::json!([{"policy_name": "HIPAA Safe Harbor"}]),
            scanned_at: Utc::now(),
        };
        let record: ExportRecord = row.into();
        assert_eq!(record.record_type, RecordType::ScanResult);
        assert_eq!(record.policy_violations, vec!["HIPAA Safe Harbor"]);
        assert_eq!(record.entity_types.len(), 2);
    }

    #[test]
    fn access_event_row_has_no_risk_fields() {
        let row = AccessEventExportRow {
            tenant_id: Uuid::nil(),
            file_path: "/data/patients.csv".to_string(),
            action: "write".to_string(),
            user_name: Some("alice".to_string()),
            event_time: Utc::now(),
            event_source: "linux_auditd".to_string(),
        };
        let record: ExportRecord = row.into();
        assert_eq!(record.record_type, RecordType::AccessEvent);
        assert!(record.risk_score.is_none());
        assert_eq!(record.action_taken.as_deref(), Some("write"));
    }
}
