//! Elasticsearch / Elastic SIEM sink via the Bulk API (§4.I, §6).
//!
//! `POST {host}/_bulk`, NDJSON alternating
//! `{"index":{"_index":"prefix-type-YYYY.MM.DD"}}` + ECS document lines.

use crate::record::ExportRecord;
use crate::sinks::SiemSink;
use async_trait::async_trait;
use openlabels_core::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;

const MAX_BATCH_SIZE: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub enum ElasticAuth {
    ApiKey(String),
    Basic { username: String, password: String },
    None,
}

pub struct ElasticSink {
    client: Client,
    host: String,
    auth: ElasticAuth,
    index_prefix: String,
}

impl ElasticSink {
    pub fn new(host: String, auth: ElasticAuth, index_prefix: String) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            auth,
            index_prefix,
        }
    }

    fn index_name(&self, record: &ExportRecord) -> String {
        format!(
            "{}-{}-{}",
            self.index_prefix,
            record.record_type.as_str(),
            record.timestamp.format("%Y.%m.%d")
        )
    }

    fn to_ecs(&self, record: &ExportRecord) -> serde_json::Value {
        let mut doc = serde_json::json!({
            "@timestamp": record.timestamp.to_rfc3339(),
            "event": {
                "kind": if record.policy_violations.is_empty() { "event" } else { "alert" },
                "category": ["file"],
                "type": [record.record_type.as_str()],
                "risk_score": record.risk_score,
                "severity_name": record.risk_tier,
                "action": record.action_taken,
            },
            "file": { "path": record.file_path },
            "labels": {
                "tenant_id": record.tenant_id.to_string(),
                "source_adapter": record.source_adapter,
                "entity_types": record.entity_types,
            },
            "rule": { "name": record.policy_violations },
        });
        if let Some(user) = &record.user {
            doc["user"] = serde_json::json!({ "name": user });
        }
        if !record.entity_counts.is_empty() {
            doc["labels"]["entity_counts"] = serde_json::Value::Object(record.entity_counts.clone());
        }
        doc
    }

    fn build_bulk_body(&self, records: &[ExportRecord]) -> String {
        let mut lines = String::new();
        for record in records {
            let action = serde_json::json!({"index": {"_index": self.index_name(record)}});
            lines.push_str(&action.to_string());
            lines.push('\n');
            lines.push_str(&self.to_ecs(record).to_string());
            lines.push('\n');
        }
        lines
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.host);
        let builder = self.client.get(&url);
        match &self.auth {
            ElasticAuth::ApiKey(key) => builder.header("Authorization", format!("ApiKey {key}")),
            ElasticAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            ElasticAuth::None => builder,
        }
    }

    fn post_bulk_request(&self, body: String) -> reqwest::RequestBuilder {
        let url = format!("{}/_bulk", self.host);
        let builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        match &self.auth {
            ElasticAuth::ApiKey(key) => builder.header("Authorization", format!("ApiKey {key}")),
            ElasticAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            ElasticAuth::None => builder,
        }
    }
}

#[async_trait]
impl SiemSink for ElasticSink {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut total_sent = 0usize;
        for chunk in records.chunks(MAX_BATCH_SIZE) {
            let body = self.build_bulk_body(chunk);
            let resp = self
                .post_bulk_request(body)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| Error::transient(format!("Elastic Bulk API request failed: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body.chars().take(200).collect::<String>(), "Elastic Bulk API returned non-2xx");
                break;
            }

            let result: serde_json::Value = resp.json().await.map_err(Error::from)?;
            let items = result["items"].as_array().cloned().unwrap_or_default();
            if result["errors"].as_bool().unwrap_or(false) {
                let failed = items
                    .iter()
                    .filter(|item| item["index"]["error"].is_object())
                    .count();
                let succeeded = items.len() - failed;
                tracing::warn!(succeeded, failed, "Elastic Bulk API: partial failure");
                total_sent += succeeded;
            } else {
                total_sent += items.len();
            }
        }
        Ok(total_sent)
    }

    async fn test_connection(&self) -> Result<bool> {
        let resp = self.request("/").timeout(Duration::from_secs(10)).send().await;
        Ok(matches!(resp, Ok(r) if r.status().is_success()))
    }

    fn name(&self) -> &'static str {
        "elastic"
    }
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
            file_path: "/a/b.txt".to_string(),
            risk_score: Some(42),
            risk_tier: Some("MEDIUM".to_string()),
            entity_types: vec!["EMAIL".to_string()],
            entity_counts: serde_json::Map::new(),
            policy_violations: vec![],
            action_taken: None,
            user: Some("bob".to_string()),
            source_adapter: "filesystem".to_string(),
        }
    }

    #[test]
    fn index_name_is_date_suffixed_by_record_type() {
        let sink = ElasticSink::new("https://es.example.com:9200".to_string(), ElasticAuth::None, "openlabels".to_string());
        let name = sink.index_name(&sample());
        assert!(name.starts_with("openlabels-scan_result-"));
    }

    #[test]
    fn bulk_body_alternates_action_and_document_lines() {
        let sink = ElasticSink::new("https://es.example.com:9200".to_string(), ElasticAuth::None, "openlabels".to_string());
        let body = sink.build_bulk_body(&[sample()]);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"index\""));
        assert!(lines[1].contains("\"@timestamp\""));
    }
}
