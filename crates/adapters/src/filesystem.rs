//! Shared implementation for `Filesystem` and `Nfs` (§4.A: NFS is an
//! OS-mounted path, not a distinct wire protocol, so both share this walker
//! over `tokio::fs`).

use crate::kind::AdapterKind;
use crate::path_safety::resolve_within_root;
use crate::traits::{Adapter, EnumeratePage, FileInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::types::ExposureLevel;
use std::path::PathBuf;

/// Cap on entries returned by one `enumerate` call; the cursor is the last
/// path yielded, a lexical resume point over the recursive walk.
const PAGE_SIZE: usize = 500;

/// 4 KiB over the read timeout budget's practical cap for an in-memory
/// adapter read; anything larger should go through a streaming extractor the
/// pipeline invokes directly instead of buffering here.
const MAX_IN_MEMORY_READ_BYTES: u64 = 512 * 1024 * 1024;

pub struct FilesystemAdapter {
    root: PathBuf,
    kind: AdapterKind,
}

impl FilesystemAdapter {
    pub fn new(root_path: impl Into<PathBuf>, kind: AdapterKind) -> Self {
        Self {
            root: root_path.into(),
            kind,
        }
    }

    fn walk_from(&self, start_cursor: Option<&str>) -> Result<EnumeratePage> {
        let mut entries = Vec::new();
        let mut stack = vec![self.root.clone()];
        let mut resuming = start_cursor.is_some();

        while let Some(dir) = stack.pop() {
            let read_dir = match std::fs::read_dir(&dir) {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => continue,
                Err(e) => {
                    return Err(Error::new(
                        ErrorCode::Transient,
                        format!("failed to read directory {}: {e}", dir.display()),
                    ))
                }
            };

            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }

                let rel_path = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string();

                if resuming {
                    if let Some(cursor) = start_cursor {
                        if rel_path.as_str() == cursor {
                            resuming = false;
                        }
                        continue;
                    }
                }

                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                let modified_at = metadata
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from);

                let mut info = FileInfo::new(rel_path.clone(), metadata.len(), ExposureLevel::Private);
                info.modified_at = modified_at;
                info.cursor = Some(rel_path);

                entries.push(info);

                if entries.len() >= PAGE_SIZE {
                    let next_cursor = entries.last().and_then(|f| f.cursor.clone());
                    return Ok(EnumeratePage {
                        files: entries,
                        next_cursor,
                        is_last_page: false,
                    });
                }
            }
        }

        Ok(EnumeratePage {
            files: entries,
            next_cursor: None,
            is_last_page: true,
        })
    }
}

#[async_trait]
impl Adapter for FilesystemAdapter {
    async fn enumerate(&self, start_cursor: Option<&str>) -> Result<EnumeratePage> {
        let root = self.root.clone();
        let cursor = start_cursor.map(|s| s.to_string());
        let adapter = FilesystemAdapter {
            root,
            kind: self.kind,
        };
        tokio::task::spawn_blocking(move || adapter.walk_from(cursor.as_deref()))
            .await
            .map_err(|e| Error::new(ErrorCode::InternalServerError, format!("enumerate task panicked: {e}")))?
    }

    async fn read(&self, file: &FileInfo) -> Result<Vec<u8>> {
        if file.size > MAX_IN_MEMORY_READ_BYTES {
            return Err(Error::new(
                ErrorCode::ValueOutOfRange,
                format!("file '{}' exceeds the in-memory read limit", file.path),
            ));
        }

        let resolved = resolve_within_root(&self.root, &file.path)?;

        tokio::fs::read(&resolved).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::new(ErrorCode::NotFound, format!("file not found: {}", file.path))
            }
            std::io::ErrorKind::PermissionDenied => Error::new(
                ErrorCode::PermissionDenied,
                format!("permission denied reading {}", file.path),
            ),
            _ => Error::new(ErrorCode::Transient, format!("read failed for {}: {e}", file.path)),
        })
    }

    async fn get_metadata(&self, file: &FileInfo) -> Result<FileInfo> {
        let resolved = resolve_within_root(&self.root, &file.path)?;
        let metadata = tokio::fs::metadata(&resolved).await.map_err(|e| {
            Error::new(ErrorCode::NotFound, format!("metadata refresh failed for {}: {e}", file.path))
        })?;

        let mut refreshed = file.clone();
        refreshed.size = metadata.len();
        refreshed.modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
        Ok(refreshed)
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(tokio::fs::metadata(&self.root).await.is_ok())
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_tree() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("openlabels-fs-adapter-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("a.txt"), b"hello").unwrap();
        fs::write(dir.join("sub/b.txt"), b"world").unwrap();
        dir
    }

    #[tokio::test]
    async fn enumerate_finds_nested_files() {
        let dir = make_tree();
        let adapter = FilesystemAdapter::new(dir.clone(), AdapterKind::Filesystem);
        let page = adapter.enumerate(None).await.unwrap();
        assert_eq!(page.files.len(), 2);
        assert!(page.is_last_page);
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn read_returns_not_found_for_missing_file() {
        let dir = make_tree();
        let adapter = FilesystemAdapter::new(dir.clone(), AdapterKind::Filesystem);
        let missing = FileInfo::new("missing.txt", 0, ExposureLevel::Private);
        let result = adapter.read(&missing).await;
        assert!(result.is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn read_rejects_path_escaping_root() {
        let dir = make_tree();
        let adapter = FilesystemAdapter::new(dir.clone(), AdapterKind::Filesystem);
        let escaping = FileInfo::new("../../etc/passwd", 0, ExposureLevel::Private);
        let result = adapter.read(&escaping).await;
        assert!(result.is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
