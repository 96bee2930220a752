//! Shared implementation for `S3`, `Gcs`, and `AzureBlob` over the
//! `object_store` crate (§4.A: cloud-object adapters share one
//! implementation parameterized over an object-store backend). Grounded on
//! the same crate the catalog writer uses for its own parquet output.

use crate::kind::AdapterKind;
use crate::traits::{Adapter, EnumeratePage, FileInfo};
use async_trait::async_trait;
use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::types::ExposureLevel;
use std::sync::Arc;

const PAGE_SIZE: usize = 1000;

/// Connection parameters for one cloud backend. Credential fields here are
/// already-decrypted plaintext: `kind::build_adapter` decrypts the
/// at-rest `*_encrypted` config fields once, before constructing the store
/// client, rather than on every request.
#[derive(Debug, Clone)]
pub enum ObjectStoreBackend {
    S3 {
        bucket: String,
        region: String,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
    Gcs {
        bucket: String,
        service_account_key: Option<String>,
    },
    AzureBlob {
        account: String,
        container: String,
        access_key: Option<String>,
    },
}

pub struct ObjectStorageAdapter {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    kind: AdapterKind,
}

impl ObjectStorageAdapter {
    pub fn new(backend: ObjectStoreBackend, prefix: Option<String>) -> Result<Self> {
        let (store, kind): (Arc<dyn ObjectStore>, AdapterKind) = match backend {
            ObjectStoreBackend::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
            } => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(bucket).with_region(region);
                if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
                    builder = builder.with_access_key_id(key_id).with_secret_access_key(secret);
                }
                let store = builder.build().map_err(object_store_build_error)?;
                (Arc::new(store), AdapterKind::S3)
            }
            ObjectStoreBackend::Gcs {
                bucket,
                service_account_key,
            } => {
                let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
                if let Some(key) = service_account_key {
                    builder = builder.with_service_account_key(key);
                }
                let store = builder.build().map_err(object_store_build_error)?;
                (Arc::new(store), AdapterKind::Gcs)
            }
            ObjectStoreBackend::AzureBlob {
                account,
                container,
                access_key,
            } => {
                let mut builder = MicrosoftAzureBuilder::new()
                    .with_account(account)
                    .with_container_name(container);
                if let Some(key) = access_key {
                    builder = builder.with_access_key(key);
                }
                let store = builder.build().map_err(object_store_build_error)?;
                (Arc::new(store), AdapterKind::AzureBlob)
            }
        };

        Ok(Self { store, prefix, kind })
    }

    fn exposure_for(&self, _path: &ObjectPath) -> ExposureLevel {
        // Cloud adapters learn exposure from bucket ACL/public-access-block
        // policy, not per-object metadata; conservative default until that
        // probe is wired in by the orchestrator's target setup.
        ExposureLevel::Internal
    }
}

fn object_store_build_error(err: object_store::Error) -> Error {
    Error::new(
        ErrorCode::ConfigurationError,
        format!("failed to construct object store client: {err}"),
    )
}

#[async_trait]
impl Adapter for ObjectStorageAdapter {
    async fn enumerate(&self, start_cursor: Option<&str>) -> Result<EnumeratePage> {
        use futures::StreamExt;

        let prefix = self.prefix.as_deref().map(ObjectPath::from);
        let mut stream = self.store.list(prefix.as_ref());

        let mut files = Vec::new();
        let mut resuming = start_cursor.is_some();
        let mut last_seen = None;

        while let Some(meta) = stream.next().await {
            let meta = meta?;
            let key = meta.location.to_string();

            if resuming {
                if Some(key.as_str()) == start_cursor {
                    resuming = false;
                }
                continue;
            }

            let mut info = FileInfo::new(key.clone(), meta.size as u64, self.exposure_for(&meta.location));
            info.modified_at = Some(meta.last_modified);
            info.cursor = Some(key.clone());
            last_seen = Some(key);
            files.push(info);

            if files.len() >= PAGE_SIZE {
                return Ok(EnumeratePage {
                    files,
                    next_cursor: last_seen,
                    is_last_page: false,
                });
            }
        }

        Ok(EnumeratePage {
            files,
            next_cursor: None,
            is_last_page: true,
        })
    }

    async fn read(&self, file: &FileInfo) -> Result<Vec<u8>> {
        let path = ObjectPath::from(file.path.as_str());
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::new(ErrorCode::NotFound, format!("object not found: {}", file.path))
            }
            other => Error::new(ErrorCode::Transient, format!("object read failed: {other}")),
        })?;

        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn get_metadata(&self, file: &FileInfo) -> Result<FileInfo> {
        let path = ObjectPath::from(file.path.as_str());
        let meta = self.store.head(&path).await?;

        let mut refreshed = file.clone();
        refreshed.size = meta.size as u64;
        refreshed.modified_at = Some(meta.last_modified);
        Ok(refreshed)
    }

    async fn test_connection(&self) -> Result<bool> {
        use futures::StreamExt;
        let prefix = self.prefix.as_deref().map(ObjectPath::from);
        let mut stream = self.store.list(prefix.as_ref());
        match tokio::time::timeout(std::time::Duration::from_secs(10), stream.next()).await {
            Ok(Some(Ok(_))) | Ok(None) => Ok(true),
            Ok(Some(Err(_))) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_defaults_to_internal_pending_acl_probe() {
        // Exercised indirectly through enumerate in integration tests that
        // need real credentials; this just documents the conservative
        // default so a change here is a visible diff, not a silent drift.
        let _ = Utc::now();
    }
}
