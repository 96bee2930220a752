//! Tagged-enum adapter selection (§9 "Runtime reflection and dynamic
//! configuration"): a `ScanTarget`'s adapter is chosen by matching on
//! `AdapterKind`, never by looking up a constructor in a string-keyed
//! registry. `AdapterConfig` is the corresponding sum-of-struct: one variant
//! per kind, each carrying exactly the fields that kind needs.

use crate::filesystem::FilesystemAdapter;
use crate::graph::GraphAdapter;
use crate::object_storage::{ObjectStorageAdapter, ObjectStoreBackend};
use crate::smb::SmbAdapter;
use crate::traits::Adapter;
use openlabels_core::security::EncryptionService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Filesystem,
    Smb,
    Nfs,
    SharePoint,
    OneDrive,
    S3,
    Gcs,
    AzureBlob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterConfig {
    Filesystem {
        root_path: String,
    },
    /// NFS shares are treated as an OS-mounted path, not a distinct wire
    /// protocol (§4.A) — same shape as Filesystem.
    Nfs {
        root_path: String,
    },
    /// SMB shares are consumed the same way: the credentialed mount is
    /// performed outside the core (by the host OS / CSI layer); the adapter
    /// only ever sees a local mount point. This keeps the adapter layer free
    /// of a fabricated SMB-protocol client dependency.
    Smb {
        root_path: String,
        mount_host: String,
        mount_share: String,
    },
    SharePoint {
        site_id: String,
        drive_id: String,
        tenant_id: String,
        client_id: String,
        client_secret_encrypted: String,
    },
    OneDrive {
        user_id: String,
        tenant_id: String,
        client_id: String,
        client_secret_encrypted: String,
    },
    S3 {
        bucket: String,
        region: String,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key_encrypted: Option<String>,
    },
    Gcs {
        bucket: String,
        prefix: Option<String>,
        service_account_key_encrypted: Option<String>,
    },
    AzureBlob {
        account: String,
        container: String,
        prefix: Option<String>,
        access_key_encrypted: Option<String>,
    },
}

impl AdapterConfig {
    pub fn kind(&self) -> AdapterKind {
        match self {
            AdapterConfig::Filesystem { .. } => AdapterKind::Filesystem,
            AdapterConfig::Nfs { .. } => AdapterKind::Nfs,
            AdapterConfig::Smb { .. } => AdapterKind::Smb,
            AdapterConfig::SharePoint { .. } => AdapterKind::SharePoint,
            AdapterConfig::OneDrive { .. } => AdapterKind::OneDrive,
            AdapterConfig::S3 { .. } => AdapterKind::S3,
            AdapterConfig::Gcs { .. } => AdapterKind::Gcs,
            AdapterConfig::AzureBlob { .. } => AdapterKind::AzureBlob,
        }
    }
}

/// Decrypts an optional at-rest secret field, leaving `None` untouched.
fn decrypt_opt(encryption: &EncryptionService, value: &Option<String>) -> openlabels_core::error::Result<Option<String>> {
    value.as_deref().map(|v| encryption.decrypt_string(v)).transpose()
}

/// Builds the concrete adapter for a target's configuration. This is the
/// one place that matches on `AdapterConfig` — every call site above it just
/// holds a `dyn Adapter`. Credentials are decrypted once here, at adapter
/// construction, rather than per-request inside the adapter.
pub fn build_adapter(
    config: &AdapterConfig,
    encryption: &EncryptionService,
) -> openlabels_core::error::Result<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match config {
        AdapterConfig::Filesystem { root_path } | AdapterConfig::Nfs { root_path } => {
            Arc::new(FilesystemAdapter::new(root_path.clone(), config.kind()))
        }
        AdapterConfig::Smb { root_path, .. } => {
            Arc::new(SmbAdapter::new(FilesystemAdapter::new(
                root_path.clone(),
                AdapterKind::Smb,
            )))
        }
        AdapterConfig::SharePoint {
            site_id,
            drive_id,
            tenant_id,
            client_id,
            client_secret_encrypted,
        } => Arc::new(GraphAdapter::new_sharepoint(
            site_id.clone(),
            drive_id.clone(),
            tenant_id.clone(),
            client_id.clone(),
            encryption.decrypt_string(client_secret_encrypted)?,
        )),
        AdapterConfig::OneDrive {
            user_id,
            tenant_id,
            client_id,
            client_secret_encrypted,
        } => Arc::new(GraphAdapter::new_onedrive(
            user_id.clone(),
            tenant_id.clone(),
            client_id.clone(),
            encryption.decrypt_string(client_secret_encrypted)?,
        )),
        AdapterConfig::S3 {
            bucket,
            region,
            prefix,
            access_key_id,
            secret_access_key_encrypted,
        } => Arc::new(ObjectStorageAdapter::new(
            ObjectStoreBackend::S3 {
                bucket: bucket.clone(),
                region: region.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: decrypt_opt(encryption, secret_access_key_encrypted)?,
            },
            prefix.clone(),
        )?),
        AdapterConfig::Gcs {
            bucket,
            prefix,
            service_account_key_encrypted,
        } => Arc::new(ObjectStorageAdapter::new(
            ObjectStoreBackend::Gcs {
                bucket: bucket.clone(),
                service_account_key: decrypt_opt(encryption, service_account_key_encrypted)?,
            },
            prefix.clone(),
        )?),
        AdapterConfig::AzureBlob {
            account,
            container,
            prefix,
            access_key_encrypted,
        } => Arc::new(ObjectStorageAdapter::new(
            ObjectStoreBackend::AzureBlob {
                account: account.clone(),
                container: container.clone(),
                access_key: decrypt_opt(encryption, access_key_encrypted)?,
            },
            prefix.clone(),
        )?),
    };

    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_kind_matches_the_variant() {
        let config = AdapterConfig::S3 {
            bucket: "b".into(),
            region: "us-east-1".into(),
            prefix: None,
            access_key_id: None,
            secret_access_key_encrypted: None,
        };
        assert_eq!(config.kind(), AdapterKind::S3);
    }
}
