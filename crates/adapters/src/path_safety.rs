//! Path-traversal guard shared by every adapter that resolves a user-supplied
//! relative path against a configured root (Filesystem, NFS, SMB, and the
//! local side of SharePoint/OneDrive sync). Canonicalizes the requested path
//! and rejects it unless the result still lives under the root — and reads
//! the resolved path the check already produced, rather than re-resolving
//! between check and use, to avoid a TOCTOU reopen.

use openlabels_core::error::{Error, ErrorCode, Result};
use std::path::{Path, PathBuf};

/// Resolves `requested` against `root`, canonicalizing both, and returns the
/// canonical path only if it is `root` or a descendant of it.
pub fn resolve_within_root(root: &Path, requested: &str) -> Result<PathBuf> {
    let root_canonical = root.canonicalize().map_err(|e| {
        Error::new(
            ErrorCode::ResourceNotFound,
            format!("adapter root '{}' does not exist: {e}", root.display()),
        )
    })?;

    let candidate = root_canonical.join(requested.trim_start_matches(['/', '\\']));

    let resolved = candidate.canonicalize().map_err(|e| {
        Error::new(
            ErrorCode::ResourceNotFound,
            format!("path '{requested}' does not exist: {e}"),
        )
    })?;

    if resolved.starts_with(&root_canonical) {
        Ok(resolved)
    } else {
        Err(Error::new(
            ErrorCode::PermissionDenied,
            format!("path '{requested}' escapes the configured adapter root"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_traversal_above_root() {
        let dir = std::env::temp_dir().join(format!("openlabels-path-safety-{}", std::process::id()));
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/file.txt"), b"hello").unwrap();

        let ok = resolve_within_root(&dir, "sub/file.txt");
        assert!(ok.is_ok());

        let escape = resolve_within_root(&dir, "../../etc/passwd");
        assert!(escape.is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
