// Owner-only permissions for files under ~/.atelier/.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

const OWNER_ONLY_FILE_MODE: u32 = 0o600;
const OWNER_ONLY_DIR_MODE: u32 = 0o700;

pub fn ensure_owner_only_file(path: &Path) -> Result<()> {
    restrict_mode(path, OWNER_ONLY_FILE_MODE)
}

pub fn ensure_owner_only_dir(path: &Path) -> Result<()> {
    restrict_mode(path, OWNER_ONLY_DIR_MODE)
}

/// Write `contents` to `path`, creating parents, and leave the file
/// readable by the owner only.
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
        ensure_owner_only_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write `{}`", path.display()))?;
    ensure_owner_only_file(path)
}

#[cfg(unix)]
fn restrict_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !path.exists() {
        return Ok(());
    }

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata for `{}`", path.display()))?;
    if metadata.permissions().mode() & 0o777 != mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("failed to set owner-only mode on `{}`", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
