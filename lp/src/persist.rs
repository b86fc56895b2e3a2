//! Atomic file replacement

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PlannerError;

/// Replace `path` with `contents` via a sibling temp file and rename
///
/// The target is untouched unless every step succeeds. A symlinked target is
/// resolved so the link survives and its destination is replaced. Existing
/// permissions carry over; a new file gets `NEW_FILE_MODE`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PlannerError> {
    debug!(?path, contents_len = contents.len(), "write_atomic: called");
    let resolved = resolve_target(path);
    let path = resolved.as_path();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| PlannerError::io(parent, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| PlannerError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| PlannerError::io(tmp.path(), e))?;

    let permissions = match fs::metadata(path) {
        Ok(meta) => {
            debug!("write_atomic: preserving existing permissions");
            Some(meta.permissions())
        }
        Err(_) => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| PlannerError::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| PlannerError::io(path, e.error))?;
    debug!("write_atomic: persisted");
    Ok(())
}

/// Mode for files that did not exist before (temp files start at 0600)
#[cfg(unix)]
pub const NEW_FILE_MODE: u32 = 0o644;

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Follow symlinks on an existing target; a missing or dangling one is written as given
fn resolve_target(path: &Path) -> PathBuf {
    match fs::canonicalize(path) {
        Ok(real) => {
            if real != path {
                debug!(?real, "write_atomic: writing through to resolved target");
            }
            real
        }
        Err(_) => path.to_path_buf(),
    }
}
