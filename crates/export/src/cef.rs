//! CEF and LEEF field encoding shared by the QRadar and Syslog-CEF sinks
//! (§4.I, §6). Both formats escape a different character set, so the two
//! escapers stay separate even though the header framing is nearly
//! identical.

use crate::record::ExportRecord;

/// Escapes CEF extension values: backslash, equals, pipe.
pub fn cef_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('=', "\\=").replace('|', "\\|")
}

/// Escapes LEEF extension values: backslash, tab, equals.
pub fn leef_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\t', "\\t").replace('=', "\\=")
}

pub fn risk_tier_to_cef_severity(tier: Option<&str>) -> u8 {
    match tier.unwrap_or("").to_uppercase().as_str() {
        "CRITICAL" => 10,
        "HIGH" => 7,
        "MEDIUM" => 5,
        "LOW" => 3,
        _ => 1,
    }
}

/// Formats a record as `CEF:0|Vendor|Product|Version|id|name|severity|ext`
/// (§6, bit-exact wire format).
pub fn format_cef(record: &ExportRecord, vendor: &str, product: &str, version: &str) -> String {
    let severity = risk_tier_to_cef_severity(record.risk_tier.as_deref());
    let event_id = record.record_type.as_str().replace('_', "");
    let name = format!("OpenLabels {}", record.record_type.as_str());
    let extensions = format!(
        "filePath={} riskScore={} riskTier={} entityTypes={} policyViolations={} \
         suser={} act={} rt={} src={}",
        cef_escape(&record.file_path),
        record.risk_score.unwrap_or(0),
        record.risk_tier.as_deref().unwrap_or("MINIMAL"),
        record.entity_types.join(","),
        record.policy_violations.join(","),
        cef_escape(record.user.as_deref().unwrap_or("")),
        cef_escape(record.action_taken.as_deref().unwrap_or("")),
        record.timestamp.format("%b %d %Y %H:%M:%S"),
        cef_escape(&record.source_adapter),
    );
    format!("CEF:0|{vendor}|{product}|{version}|{event_id}|{name}|{severity}|{extensions}")
}

/// Formats a record as LEEF 2.0: `LEEF:2.0|Vendor|Product|Version|id|k=v\tk=v...`
pub fn format_leef(record: &ExportRecord, vendor: &str, product: &str, version: &str) -> String {
    let event_id = record.record_type.as_str().replace('_', "");
    let fields: Vec<(&str, String)> = vec![
        ("devTime", record.timestamp.format("%b %d %Y %H:%M:%S").to_string()),
        ("filePath", record.file_path.clone()),
        ("riskScore", record.risk_score.unwrap_or(0).to_string()),
        ("riskTier", record.risk_tier.clone().unwrap_or_default()),
        ("entityTypes", record.entity_types.join(",")),
        ("entityCounts", serde_json::Value::Object(record.entity_counts.clone()).to_string()),
        ("policyViolations", record.policy_violations.join(",")),
        ("actionTaken", record.action_taken.clone().unwrap_or_default()),
        ("userName", record.user.clone().unwrap_or_default()),
        ("sourceAdapter", record.source_adapter.clone()),
        ("tenantId", record.tenant_id.to_string()),
    ];
    let extensions = fields
        .into_iter()
        .map(|(k, v)| format!("{k}={}", leef_escape(&v)))
        .collect::<Vec<_>>()
        .join("\t");
    format!("LEEF:2.0|{vendor}|{product}|{version}|{event_id}|{extensions}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample() -> ExportRecord {
        ExportRecord {
            record_type: RecordType::ScanResult,
            timestamp: Utc::now(),
            tenant_id: Uuid::nil(),
            file_path: "/share/a=b|c.txt".to_string(),
            risk_score: Some(65),
            risk_tier: Some("HIGH".to_string()),
            entity_types: vec!["SSN".to_string()],
            entity_counts: serde_json::Map::new(),
            policy_violations: vec!["HIPAA".to_string()],
            action_taken: None,
            user: Some("alice".to_string()),
            source_adapter: "filesystem".to_string(),
        }
    }

    #[test]
    fn cef_escapes_pipe_and_equals_in_file_path() {
        let cef = format_cef(&sample(), "OpenLabels", "Scanner", "2.0");
        assert!(cef.starts_with("CEF:0|OpenLabels|Scanner|2.0|scanresult|"));
        assert!(cef.contains("filePath=/share/a\\=b\\|c.txt"));
        assert!(cef.contains("riskScore=65"));
    }

    #[test]
    fn leef_uses_tab_separated_extensions() {
        let leef = format_leef(&sample(), "OpenLabels", "Scanner", "2.0");
        assert!(leef.starts_with("LEEF:2.0|OpenLabels|Scanner|2.0|scanresult|"));
        assert!(leef.contains("filePath=/share/a=b|c.txt"));
        assert!(leef.contains("\triskScore=65\t"));
    }

    #[test]
    fn severity_mapping_matches_risk_tiers() {
        assert_eq!(risk_tier_to_cef_severity(Some("CRITICAL")), 10);
        assert_eq!(risk_tier_to_cef_severity(Some("minimal")), 1);
        assert_eq!(risk_tier_to_cef_severity(None), 1);
    }
}
