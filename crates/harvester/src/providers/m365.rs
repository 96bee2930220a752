//! Microsoft 365 Management Activity API pull provider. Acquires an
//! application-only OAuth2 token via the client-credentials grant, then lists
//! and fetches content blobs from the `SharePointFileOperation` content type,
//! which is where file read/write/delete/rename activity for SharePoint and
//! OneDrive shows up.

use crate::providers::PullProvider;
use crate::types::{AccessAction, RawAccessEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::{Error, ErrorCode, Result};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const MANAGEMENT_BASE: &str = "https://manage.office.com/api/v1.0";
const CONTENT_TYPE: &str = "Audit.SharePoint";

pub struct M365AuditProvider {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    token: Arc<Mutex<Option<CachedToken>>>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ContentRecord {
    #[serde(rename = "contentUri")]
    content_uri: String,
}

#[derive(Deserialize)]
struct AuditEvent {
    #[serde(rename = "CreationTime")]
    creation_time: DateTime<Utc>,
    #[serde(rename = "Operation")]
    operation: String,
    #[serde(rename = "UserId")]
    user_id: Option<String>,
    #[serde(rename = "ObjectId")]
    object_id: Option<String>,
    #[serde(rename = "SourceFileName")]
    source_file_name: Option<String>,
}

impl M365AuditProvider {
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client: reqwest::Client::new(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                return Ok(cached.value.clone());
            }
        }

        let url = format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", self.tenant_id);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", "https://manage.office.com/.default"),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 token request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 token request rejected: {e}")))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 token response malformed: {e}")))?;

        let expires_at = Utc::now() + chrono::Duration::seconds(response.expires_in);
        *guard = Some(CachedToken { value: response.access_token.clone(), expires_at });
        Ok(response.access_token)
    }

    async fn list_content_blobs(&self, token: &str, since: DateTime<Utc>) -> Result<Vec<ContentRecord>> {
        let url = format!(
            "{MANAGEMENT_BASE}/{}/activity/feed/subscriptions/content?contentType={CONTENT_TYPE}&startTime={}&endTime={}",
            self.tenant_id,
            since.format("%Y-%m-%dT%H:%M:%S"),
            Utc::now().format("%Y-%m-%dT%H:%M:%S"),
        );

        let records = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content list failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content list rejected: {e}")))?
            .json::<Vec<ContentRecord>>()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content list malformed: {e}")))?;

        Ok(records)
    }

    async fn fetch_audit_events(&self, token: &str, content_uri: &str) -> Result<Vec<AuditEvent>> {
        let events = self
            .client
            .get(content_uri)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content blob fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content blob fetch rejected: {e}")))?
            .json::<Vec<AuditEvent>>()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("m365 content blob malformed: {e}")))?;

        Ok(events)
    }
}

#[async_trait]
impl PullProvider for M365AuditProvider {
    fn name(&self) -> &'static str {
        "m365_audit"
    }

    async fn harvest(&self, since: DateTime<Utc>) -> Result<Vec<RawAccessEvent>> {
        let token = self.access_token().await?;
        let blobs = self.list_content_blobs(&token, since).await?;

        let mut events = Vec::new();
        for blob in blobs {
            let audit_events = self.fetch_audit_events(&token, &blob.content_uri).await?;
            for audit_event in audit_events {
                if audit_event.creation_time <= since {
                    continue;
                }
                let file_path = audit_event
                    .source_file_name
                    .or(audit_event.object_id)
                    .unwrap_or_else(|| "<unknown>".to_string());

                let mut event = RawAccessEvent::new(file_path, operation_to_action(&audit_event.operation), "m365_audit")
                    .with_event_time(audit_event.creation_time);
                if let Some(user) = audit_event.user_id {
                    event = event.with_user(user);
                }
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn operation_to_action(operation: &str) -> AccessAction {
    match operation {
        "FileDeleted" | "FileRecycled" => AccessAction::Delete,
        "FileRenamed" | "FileMoved" => AccessAction::Rename,
        "FileUploaded" | "FileModified" | "FileCopied" => AccessAction::Write,
        _ => AccessAction::Read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_operations_map_to_delete() {
        assert_eq!(operation_to_action("FileDeleted"), AccessAction::Delete);
        assert_eq!(operation_to_action("FileRecycled"), AccessAction::Delete);
    }

    #[test]
    fn write_operations_map_to_write() {
        assert_eq!(operation_to_action("FileModified"), AccessAction::Write);
        assert_eq!(operation_to_action("FileUploaded"), AccessAction::Write);
    }

    #[test]
    fn unrecognized_operations_default_to_read() {
        assert_eq!(operation_to_action("FileAccessed"), AccessAction::Read);
    }
}
