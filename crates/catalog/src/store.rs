//! Builds the `ObjectStore` backing the catalog from `CatalogConfig`
//! (§4.H, §6 "Catalog" persisted-state layout). Local is for single-node
//! development; the cloud backends defer bucket/credential configuration to
//! their usual environment variables rather than widening `CatalogConfig`
//! with one field per cloud provider.

use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use openlabels_core::config::{CatalogBackend, CatalogConfig};
use openlabels_core::error::{Error, ErrorCode, Result};
use std::sync::Arc;

pub fn build_object_store(config: &CatalogConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        CatalogBackend::Local => {
            let path = config.local_path.as_deref().ok_or_else(|| {
                Error::new(
                    ErrorCode::ConfigurationError,
                    "catalog.local_path is required when catalog.backend = local",
                )
            })?;
            std::fs::create_dir_all(path).map_err(|err| {
                Error::new(
                    ErrorCode::ConfigurationError,
                    format!("failed to create catalog.local_path '{path}': {err}"),
                )
            })?;
            Ok(Arc::new(LocalFileSystem::new_with_prefix(path).map_err(
                |err| Error::new(ErrorCode::ConfigurationError, err.to_string()),
            )?))
        }
        CatalogBackend::S3 => {
            let store = object_store::aws::AmazonS3Builder::from_env()
                .build()
                .map_err(|err| Error::new(ErrorCode::ConfigurationError, err.to_string()))?;
            Ok(Arc::new(store))
        }
        CatalogBackend::Azure => {
            let store = object_store::azure::MicrosoftAzureBuilder::from_env()
                .build()
                .map_err(|err| Error::new(ErrorCode::ConfigurationError, err.to_string()))?;
            Ok(Arc::new(store))
        }
        CatalogBackend::Gcs => {
            let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
                .build()
                .map_err(|err| Error::new(ErrorCode::ConfigurationError, err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}
