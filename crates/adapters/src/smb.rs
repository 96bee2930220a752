//! SMB shares are mounted by the host OS (or a CSI volume in the
//! cluster case) before the adapter ever runs; this is a thin wrapper over
//! `FilesystemAdapter` rather than a protocol client, per the same
//! no-fabricated-dependency decision as NFS (§4.A).

use crate::filesystem::FilesystemAdapter;
use crate::kind::AdapterKind;
use crate::traits::{Adapter, EnumeratePage, FileInfo};
use async_trait::async_trait;
use openlabels_core::error::Result;

pub struct SmbAdapter {
    inner: FilesystemAdapter,
}

impl SmbAdapter {
    pub fn new(inner: FilesystemAdapter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Adapter for SmbAdapter {
    async fn enumerate(&self, start_cursor: Option<&str>) -> Result<EnumeratePage> {
        self.inner.enumerate(start_cursor).await
    }

    async fn read(&self, file: &FileInfo) -> Result<Vec<u8>> {
        self.inner.read(file).await
    }

    async fn get_metadata(&self, file: &FileInfo) -> Result<FileInfo> {
        self.inner.get_metadata(file).await
    }

    async fn test_connection(&self) -> Result<bool> {
        self.inner.test_connection().await
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Smb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openlabels_core::types::ExposureLevel;
    use std::fs;

    #[tokio::test]
    async fn delegates_enumerate_to_the_inner_filesystem_adapter() {
        let dir = std::env::temp_dir().join(format!("openlabels-smb-adapter-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("share.txt"), b"hello").unwrap();

        let adapter = SmbAdapter::new(FilesystemAdapter::new(dir.clone(), AdapterKind::Smb));
        let page = adapter.enumerate(None).await.unwrap();

        assert_eq!(page.files.len(), 1);
        assert_eq!(adapter.kind(), AdapterKind::Smb);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn read_reports_not_found_through_the_wrapper() {
        let dir = std::env::temp_dir().join(format!("openlabels-smb-adapter-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let adapter = SmbAdapter::new(FilesystemAdapter::new(dir.clone(), AdapterKind::Smb));
        let missing = FileInfo::new("missing.txt", 0, ExposureLevel::Private);
        assert!(adapter.read(&missing).await.is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
