use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::AssembleError;

/// Writes `contents` to `path` through a sibling temporary file that is
/// renamed over the destination, so readers only ever see the old or the new
/// artifact.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), AssembleError> {
    let write_err = |source| AssembleError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
    staged.write_all(contents.as_bytes()).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;

    let permissions = match fs::metadata(path) {
        Ok(existing) => Some(existing.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(write_err)?;
    }

    debug!(staged = %staged.path().display(), target = %path.display(), "persisting artifact");
    staged.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
