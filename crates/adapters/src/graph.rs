//! Shared implementation for `SharePoint` and `OneDrive` over the Microsoft
//! Graph REST API (§4.A: both are "a drive" in Graph's model, so one client
//! walks either given the right base path). Token refresh uses the
//! client-credentials flow; no Graph SDK crate is in the workspace stack, so
//! this talks to the REST surface directly through `reqwest`, the same way
//! the teacher's outbound HTTP integrations do.

use crate::kind::AdapterKind;
use crate::traits::{Adapter, EnumeratePage, FileInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::types::ExposureLevel;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
enum DriveScope {
    SharePoint { site_id: String, drive_id: String },
    OneDrive { user_id: String },
}

impl DriveScope {
    fn drive_root_url(&self) -> String {
        match self {
            DriveScope::SharePoint { site_id, drive_id } => {
                format!("{GRAPH_BASE}/sites/{site_id}/drives/{drive_id}/root")
            }
            DriveScope::OneDrive { user_id } => format!("{GRAPH_BASE}/users/{user_id}/drive/root"),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct GraphAdapter {
    http: reqwest::Client,
    scope: DriveScope,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
}

impl GraphAdapter {
    /// `client_secret` is the already-decrypted value; callers decrypt the
    /// stored `client_secret_encrypted` once at adapter-build time (see
    /// `kind::build_adapter`) rather than on every token refresh.
    pub fn new_sharepoint(
        site_id: String,
        drive_id: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self::new(
            DriveScope::SharePoint { site_id, drive_id },
            tenant_id,
            client_id,
            client_secret,
        )
    }

    pub fn new_onedrive(
        user_id: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self::new(DriveScope::OneDrive { user_id }, tenant_id, client_id, client_secret)
    }

    fn new(scope: DriveScope, tenant_id: String, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            scope,
            tenant_id,
            client_id,
            client_secret,
            token: RwLock::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() + chrono::Duration::seconds(30) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let url = format!("https://login.microsoftonline.com/{}/oauth2/v2.0/token", self.tenant_id);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", "https://graph.microsoft.com/.default"),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::new(
                ErrorCode::PermissionDenied,
                format!("graph token request failed with status {}", response.status()),
            ));
        }

        let parsed: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + chrono::Duration::seconds(parsed.expires_in);

        let mut guard = self.token.write().await;
        *guard = Some(CachedToken {
            token: parsed.access_token.clone(),
            expires_at,
        });

        Ok(parsed.access_token)
    }

    fn children_url(&self, item_path: Option<&str>) -> String {
        let root = self.scope.drive_root_url();
        match item_path {
            None | Some("") => format!("{root}/children?$top={PAGE_SIZE}"),
            Some(path) => format!("{root}:/{path}:/children?$top={PAGE_SIZE}"),
        }
    }

    fn content_url(&self, item_path: &str) -> String {
        format!("{}:/{}:/content", self.scope.drive_root_url(), item_path)
    }
}

#[derive(Deserialize)]
struct DriveItemPage {
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct DriveItem {
    name: String,
    size: Option<u64>,
    #[serde(rename = "lastModifiedDateTime")]
    last_modified: Option<DateTime<Utc>>,
    folder: Option<serde_json::Value>,
    #[serde(rename = "parentReference")]
    parent_reference: Option<ParentReference>,
}

#[derive(Deserialize)]
struct ParentReference {
    path: Option<String>,
}

#[async_trait]
impl Adapter for GraphAdapter {
    async fn enumerate(&self, start_cursor: Option<&str>) -> Result<EnumeratePage> {
        let token = self.access_token().await?;

        let mut url = match start_cursor {
            Some(next_link) => next_link.to_string(),
            None => self.children_url(None),
        };

        let mut files = Vec::new();
        let mut folders = Vec::new();

        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| Error::new(ErrorCode::Transient, format!("graph list failed: {e}")))?;

            let page: DriveItemPage = response.json().await?;

            for item in page.value {
                if item.folder.is_some() {
                    let rel = item
                        .parent_reference
                        .as_ref()
                        .and_then(|p| p.path.clone())
                        .unwrap_or_default();
                    folders.push(format!("{rel}/{}", item.name));
                    continue;
                }

                let rel_path = match item.parent_reference.as_ref().and_then(|p| p.path.clone()) {
                    Some(parent) => format!("{parent}/{}", item.name),
                    None => item.name.clone(),
                };

                let mut info = FileInfo::new(
                    rel_path.clone(),
                    item.size.unwrap_or(0),
                    ExposureLevel::Internal,
                );
                info.modified_at = item.last_modified;
                info.cursor = Some(rel_path);
                files.push(info);
            }

            if let Some(next) = page.next_link {
                if files.len() < PAGE_SIZE {
                    url = next;
                    continue;
                }
                return Ok(EnumeratePage {
                    files,
                    next_cursor: Some(next),
                    is_last_page: false,
                });
            }

            break;
        }

        Ok(EnumeratePage {
            files,
            next_cursor: None,
            is_last_page: true,
        })
    }

    async fn read(&self, file: &FileInfo) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let url = self.content_url(&file.path);

        let response = self.http.get(&url).bearer_auth(&token).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::new(ErrorCode::NotFound, format!("graph item not found: {}", file.path)));
        }
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::new(
                ErrorCode::PermissionDenied,
                format!("permission denied reading {}", file.path),
            ));
        }

        let bytes = response
            .error_for_status()
            .map_err(|e| Error::new(ErrorCode::Transient, format!("graph read failed: {e}")))?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }

    async fn get_metadata(&self, file: &FileInfo) -> Result<FileInfo> {
        let token = self.access_token().await?;
        let url = format!("{}:/{}", self.scope.drive_root_url(), file.path);

        let item: DriveItem = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::new(ErrorCode::NotFound, format!("graph metadata refresh failed: {e}")))?
            .json()
            .await?;

        let mut refreshed = file.clone();
        refreshed.size = item.size.unwrap_or(refreshed.size);
        refreshed.modified_at = item.last_modified;
        Ok(refreshed)
    }

    async fn test_connection(&self) -> Result<bool> {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(_) => return Ok(false),
        };
        let url = self.scope.drive_root_url();
        let status = self.http.get(&url).bearer_auth(&token).send().await?.status();
        Ok(status.is_success())
    }

    fn kind(&self) -> AdapterKind {
        match self.scope {
            DriveScope::SharePoint { .. } => AdapterKind::SharePoint,
            DriveScope::OneDrive { .. } => AdapterKind::OneDrive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharepoint_children_url_targets_the_item_path() {
        let adapter = GraphAdapter::new_sharepoint(
            "site".into(),
            "drive".into(),
            "tenant".into(),
            "client".into(),
            "secret".into(),
        );
        let url = adapter.children_url(Some("Shared Documents/reports"));
        assert!(url.contains("Shared Documents/reports:/children"));
    }

    #[test]
    fn onedrive_root_children_url_omits_item_segment() {
        let adapter = GraphAdapter::new_onedrive("user".into(), "tenant".into(), "client".into(), "secret".into());
        let url = adapter.children_url(None);
        assert!(url.ends_with("/root/children?$top=200"));
    }

    #[test]
    fn kind_reflects_scope() {
        let sp = GraphAdapter::new_sharepoint("s".into(), "d".into(), "t".into(), "c".into(), "x".into());
        assert_eq!(sp.kind(), AdapterKind::SharePoint);

        let od = GraphAdapter::new_onedrive("u".into(), "t".into(), "c".into(), "x".into());
        assert_eq!(od.kind(), AdapterKind::OneDrive);
    }
}
