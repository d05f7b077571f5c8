//! Crash-safe file writes
//!
//! Both write paths stage the full contents in a uniquely named temp file in
//! the target directory and `fsync` it before it becomes visible:
//! - `write_replace`: `rename` over the target (last writer wins)
//! - `write_new`: `hard_link` to the target, failing if it exists (first
//!   writer wins)
//!
//! Readers therefore see either the old file, the new file, or no file,
//! never a partial one. Temp files are named `.<uuid>.tmp` so they never
//! match the record extension.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

const TEMP_EXTENSION: &str = "tmp";

/// Write `bytes` to `path`, replacing any existing file
pub(crate) fn write_replace(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = parent_dir(path);
    let temp_path = write_temp(dir, bytes)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        warn!(
            temp_path = %temp_path.display(),
            error = %e,
            "Rename failed, cleaning up temp file"
        );
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io("rename", path, e));
    }

    sync_dir(dir)?;
    debug!(path = %path.display(), "Atomic rename completed");
    Ok(())
}

/// Write `bytes` to `path` only if nothing is there yet
///
/// Returns `false` without touching the existing file if `path` exists.
pub(crate) fn write_new(path: &Path, bytes: &[u8]) -> StoreResult<bool> {
    let dir = parent_dir(path);
    let temp_path = write_temp(dir, bytes)?;

    let linked = fs::hard_link(&temp_path, path);
    let _ = fs::remove_file(&temp_path);

    match linked {
        Ok(()) => {
            sync_dir(dir)?;
            debug!(path = %path.display(), "Created record file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Record file already exists");
            Ok(false)
        }
        Err(e) => Err(StoreError::io("link", path, e)),
    }
}

/// Remove `path`, returning `false` if it was already gone
pub(crate) fn remove(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io("remove", path, e)),
    }
}

/// Remove temp files left behind by interrupted writes
pub(crate) fn remove_stale_temps(dir: &Path) -> StoreResult<usize> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io("read_dir", dir, e))?;
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if is_temp_file(&path) && remove(&path)? {
            warn!(path = %path.display(), "Removed stale temp file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Flush directory metadata so a completed rename survives a crash
pub(crate) fn sync_dir(dir: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| StoreError::io("sync_dir", dir, e))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

fn write_temp(dir: &Path, bytes: &[u8]) -> StoreResult<PathBuf> {
    let temp_path = dir.join(format!(".{}.{}", Uuid::new_v4().simple(), TEMP_EXTENSION));

    let result = File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io("write", &temp_path, e));
    }
    Ok(temp_path)
}

fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with('.') && path.extension().map_or(false, |ext| ext == TEMP_EXTENSION)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
