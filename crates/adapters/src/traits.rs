//! The uniform enumeration/read interface every data-source adapter
//! implements (§4.A). Every adapter method returns `openlabels_core::Result`
//! so a caller distinguishes `Transient` (retry) from `Permanent` (skip) the
//! same way the rest of the core does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;
use openlabels_core::types::ExposureLevel;
use serde::{Deserialize, Serialize};

/// Metadata about one file, as reported by an adapter's enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub owner: Option<String>,
    pub permissions: Option<String>,
    pub exposure_level: ExposureLevel,
    /// Opaque resume marker the adapter can hand back to `enumerate` to
    /// continue a delta/paginated listing from this point.
    pub cursor: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>, size: u64, exposure_level: ExposureLevel) -> Self {
        let path = path.into();
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&path)
            .to_string();
        Self {
            path,
            name,
            size,
            modified_at: None,
            owner: None,
            permissions: None,
            exposure_level,
            cursor: None,
        }
    }
}

/// A page of enumerated files plus the cursor to resume from, so callers
/// don't need a true async-generator type to drive paginated/delta listing.
#[derive(Debug, Clone, Default)]
pub struct EnumeratePage {
    pub files: Vec<FileInfo>,
    pub next_cursor: Option<String>,
    pub is_last_page: bool,
}

/// Uniform interface over a heterogeneous data source (§4.A). One instance
/// per `ScanTarget`; constructed by `kind::build_adapter` from the target's
/// `AdapterConfig`.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Enumerates one page of files starting from `start_cursor` (`None` for
    /// the first page). Enumeration failures are `Transient` (the caller
    /// should retry the page) or `Permanent` (the caller skips the target
    /// for this run).
    async fn enumerate(&self, start_cursor: Option<&str>) -> Result<EnumeratePage>;

    /// Reads the full contents of one file. Returns `NotFound`,
    /// `PermissionDenied`, or a size-limit error via the taxonomy rather than
    /// panicking on an oversized file.
    async fn read(&self, file: &FileInfo) -> Result<Vec<u8>>;

    /// Refreshes metadata for a single file (used for resume / revalidation
    /// before acting on a stale `FileInfo`).
    async fn get_metadata(&self, file: &FileInfo) -> Result<FileInfo>;

    /// Cheap connectivity/credential check, used by target creation and the
    /// health surface.
    async fn test_connection(&self) -> Result<bool>;

    fn kind(&self) -> super::kind::AdapterKind;
}
