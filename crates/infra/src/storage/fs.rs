//! Atomic file writes

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tidewater_domain::{AgentError, Result};

use crate::errors::infra_err;

/// Write `contents` to `path` through a sibling temp file, fsync, and rename,
/// so readers see either the old file or the complete new one.
///
/// The file is created owner-only on unix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AgentError::Io(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| infra_err(e, format!("create {}", parent.display())))?;

    let temp = temp_sibling(path);
    let result = write_and_sync(&temp, contents).and_then(|()| {
        fs::rename(&temp, path).map_err(|e| infra_err(e, format!("rename into {}", path.display())))
    });
    if result.is_err() {
        // Best effort; the original error is what matters.
        let _ = fs::remove_file(&temp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

fn write_and_sync(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = private_options()
        .open(path)
        .map_err(|e| infra_err(e, format!("create {}", path.display())))?;
    file.write_all(contents).map_err(|e| infra_err(e, format!("write {}", path.display())))?;
    file.sync_all().map_err(|e| infra_err(e, format!("sync {}", path.display())))
}

/// Create `path` with `contents` only if nothing exists there yet.
///
/// The data is written and synced in a temp file, then linked into place
/// without replacing an existing file. Returns `Ok(false)` when `path`
/// already exists; the existing file is left untouched.
pub fn write_new(path: &Path, contents: &[u8]) -> Result<bool> {
    let parent = path
        .parent()
        .ok_or_else(|| AgentError::Io(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| infra_err(e, format!("create {}", parent.display())))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| infra_err(e, format!("create temp file in {}", parent.display())))?;
    temp.write_all(contents).map_err(|e| infra_err(e, format!("write {}", temp.path().display())))?;
    temp.as_file().sync_all().map_err(|e| infra_err(e, format!("sync {}", temp.path().display())))?;

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(infra_err(err.error, format!("create {}", path.display()))),
    }
}

/// Open options for a new owner-only file
pub fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Create a new owner-only file with `contents`
pub fn write_private(path: &Path, contents: &[u8]) -> Result<File> {
    let mut file = private_options()
        .open(path)
        .map_err(|e| infra_err(e, format!("create {}", path.display())))?;
    file.write_all(contents).map_err(|e| infra_err(e, format!("write {}", path.display())))?;
    file.flush().map_err(|e| infra_err(e, format!("flush {}", path.display())))?;
    Ok(file)
}
