//! Microsoft Sentinel sink via the Azure Log Analytics Data Collector API
//! (§4.I, §6).
//!
//! `POST https://{workspace_id}.ods.opinsights.azure.com/api/logs?api-version=2016-04-01`,
//! JSON array body, `Authorization: SharedKey {workspace_id}:{signature}`
//! where the signature is HMAC-SHA256 over
//! `POST\n{content_length}\napplication/json\nx-ms-date:{date}\n/api/logs`.

use crate::record::ExportRecord;
use crate::sinks::SiemSink;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use openlabels_core::error::{Error, Result};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;

const API_VERSION: &str = "2016-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type HmacSha256 = Hmac<Sha256>;

pub struct SentinelSink {
    client: Client,
    workspace_id: String,
    shared_key: String,
    log_type: String,
}

impl SentinelSink {
    pub fn new(workspace_id: String, shared_key: String, log_type: String) -> Self {
        Self {
            client: Client::new(),
            workspace_id,
            shared_key,
            log_type,
        }
    }

    fn url(&self) -> String {
        format!(
            "https://{}.ods.opinsights.azure.com/api/logs?api-version={API_VERSION}",
            self.workspace_id
        )
    }

    fn build_signature(&self, date: &str, content_length: usize) -> Result<String> {
        let string_to_sign =
            format!("POST\n{content_length}\napplication/json\nx-ms-date:{date}\n/api/logs");
        let decoded_key = STANDARD
            .decode(&self.shared_key)
            .map_err(|e| Error::validation(format!("Sentinel shared key is not valid base64: {e}")))?;
        let mut mac = HmacSha256::new_from_slice(&decoded_key)
            .map_err(|e| Error::internal(format!("Sentinel HMAC key setup failed: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.workspace_id, signature))
    }

    fn to_sentinel_record(record: &ExportRecord) -> serde_json::Value {
        serde_json::json!({
            "TimeGenerated": record.timestamp.to_rfc3339(),
            "RecordType_s": record.record_type.as_str(),
            "TenantId_s": record.tenant_id.to_string(),
            "FilePath_s": record.file_path,
            "RiskScore_d": record.risk_score,
            "RiskTier_s": record.risk_tier,
            "EntityTypes_s": record.entity_types.join(","),
            "EntityCounts_s": serde_json::Value::Object(record.entity_counts.clone()).to_string(),
            "PolicyViolations_s": record.policy_violations.join(","),
            "ActionTaken_s": record.action_taken.clone().unwrap_or_default(),
            "User_s": record.user.clone().unwrap_or_default(),
            "SourceAdapter_s": record.source_adapter,
        })
    }
}

#[async_trait]
impl SiemSink for SentinelSink {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let body = serde_json::to_string(
            &records.iter().map(Self::to_sentinel_record).collect::<Vec<_>>(),
        )
        .map_err(Error::from)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signature = self.build_signature(&date, body.len())?;

        let resp = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .header("Log-Type", &self.log_type)
            .header("Authorization", signature)
            .header("x-ms-date", date)
            .header("time-generated-field", "TimeGenerated")
            .body(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient(format!("Sentinel request failed: {e}")))?;

        if resp.status().is_success() {
            Ok(records.len())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body.chars().take(200).collect::<String>(), "Sentinel returned non-2xx");
            Ok(0)
        }
    }

    async fn test_connection(&self) -> Result<bool> {
        let probe = ExportRecord {
            record_type: crate::record::RecordType::ScanResult,
            timestamp: Utc::now(),
            tenant_id: uuid::Uuid::nil(),
            file_path: "__connection_test__".to_string(),
            risk_score: None,
            risk_tier: None,
            entity_types: vec![],
            entity_counts: serde_json::Map::new(),
            policy_violations: vec![],
            action_taken: None,
            user: None,
            source_adapter: "filesystem".to_string(),
        };
        Ok(self.export_batch(std::slice::from_ref(&probe)).await? == 1)
    }

    fn name(&self) -> &'static str {
        "sentinel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_documented_string_to_sign() {
        let sink = SentinelSink::new(
            "workspace-id".to_string(),
            STANDARD.encode("sixteen byte key"),
            "OpenLabels".to_string(),
        );
        let sig = sink.build_signature("Mon, 01 Jan 2026 00:00:00 GMT", 42).unwrap();
        assert!(sig.starts_with("SharedKey workspace-id:"));
    }

    #[test]
    fn rejects_non_base64_shared_key() {
        let sink = SentinelSink::new(
            "workspace-id".to_string(),
            "not valid base64!!".to_string(),
            "OpenLabels".to_string(),
        );
        assert!(sink.build_signature("date", 10).is_err());
    }
}
