//! Splunk HTTP Event Collector (HEC) sink (§4.I, §6).
//!
//! `POST {hec_url}/services/collector/event`, body = newline-delimited
//! `{"event":<record>,"time":<epoch>,"sourcetype":...,"index":...,"source":...}`,
//! `Authorization: Splunk {token}`.

use crate::record::ExportRecord;
use crate::sinks::SiemSink;
use async_trait::async_trait;
use openlabels_core::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// HEC recommends batches of ~1 MB; the spec caps at 500 events per request.
const MAX_BATCH_SIZE: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SplunkSink {
    client: Client,
    hec_url: String,
    hec_token: String,
    index: String,
    sourcetype: String,
}

impl SplunkSink {
    pub fn new(hec_url: String, hec_token: String, index: String, sourcetype: String) -> Self {
        Self {
            client: Client::new(),
            hec_url: hec_url.trim_end_matches('/').to_string(),
            hec_token,
            index,
            sourcetype,
        }
    }

    fn format_event(&self, record: &ExportRecord) -> String {
        let epoch = record.timestamp.timestamp_millis() as f64 / 1000.0;
        let event = serde_json::json!({
            "event": record.to_json(),
            "time": epoch,
            "sourcetype": self.sourcetype,
            "source": format!("openlabels:{}", record.record_type.as_str()),
            "index": self.index,
        });
        event.to_string()
    }
}

#[async_trait]
impl SiemSink for SplunkSink {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut total_sent = 0usize;
        for chunk in records.chunks(MAX_BATCH_SIZE) {
            let payload = chunk
                .iter()
                .map(|r| self.format_event(r))
                .collect::<Vec<_>>()
                .join("\n");

            let resp = self
                .client
                .post(format!("{}/services/collector/event", self.hec_url))
                .header("Authorization", format!("Splunk {}", self.hec_token))
                .header("Content-Type", "application/json")
                .body(payload)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| Error::transient(format!("Splunk HEC request failed: {e}")))?;

            if resp.status().is_success() {
                total_sent += chunk.len();
            } else {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body.chars().take(200).collect::<String>(), "Splunk HEC returned non-2xx");
                break;
            }
        }
        Ok(total_sent)
    }

    async fn test_connection(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/services/collector/health/1.0", self.hec_url))
            .header("Authorization", format!("Splunk {}", self.hec_token))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        Ok(matches!(resp, Ok(r) if r.status().is_success()))
    }

    fn name(&self) -> &'static str {
        "splunk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn format_event_embeds_record_and_epoch_time() {
        let sink = SplunkSink::new(
            "https://hec.example.com:8088".to_string(),
            "token".to_string(),
            "main".to_string(),
            "openlabels".to_string(),
        );
        let record = ExportRecord {
            record_type: RecordType::ScanResult,
            timestamp: Utc::now(),
            tenant_id: Uuid::nil(),
            file_path: "/a/b.txt".to_string(),
            risk_score: Some(80),
            risk_tier: Some("HIGH".to_string()),
            entity_types: vec![],
            entity_counts: serde_json::Map::new(),
            policy_violations: vec![],
            action_taken: None,
            user: None,
            source_adapter: "filesystem".to_string(),
        };
        let event = sink.format_event(&record);
        let parsed: serde_json::Value = serde_json::from_str(&event).unwrap();
        assert_eq!(parsed["sourcetype"], "openlabels");
        assert_eq!(parsed["source"], "openlabels:scan_result");
        assert!(parsed["time"].as_f64().unwrap() > 0.0);
    }
}
