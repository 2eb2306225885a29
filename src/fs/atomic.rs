//! Atomic record writes.
//!
//! All writes follow the same pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! Readers therefore observe either the previous record or the new one, never
//! a partial write. `std::fs::rename` replaces an existing target on both POSIX
//! and Windows; source and destination must share a filesystem, which holds
//! because the temp file is created next to the target.
//!
//! On crash a temporary file may remain (named `.{filename}.{pid}.tmp`).

use crate::error::{HoldfastError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file, creating parent directories as needed.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    ensure_parent_dir(path)?;

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .map_err(|e| HoldfastError::io("create directory", parent, e))?;
    }
    Ok(())
}

/// Generate a temporary file path in the same directory as the target.
///
/// The process id is part of the name so two processes never share a temp file.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            HoldfastError::UserError(format!("invalid file path '{}'", target.display()))
        })?;

    Ok(parent.join(format!(".{}.{}.tmp", filename, std::process::id())))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).map_err(|e| HoldfastError::io("create temporary file", path, e))?;

    let written = file.write_all(content).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(HoldfastError::io("write temporary file", path, e));
    }

    Ok(())
}

fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    if let Err(e) = fs::rename(source, target) {
        let _ = fs::remove_file(source);
        return Err(HoldfastError::io("replace", target, e));
    }

    // Persist the directory entry as well.
    #[cfg(unix)]
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
