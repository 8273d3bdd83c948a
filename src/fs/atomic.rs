//! Atomic file writes for the approval mailbox.
//!
//! Readers poll mailbox files while other processes write them, so a reader
//! must never observe a half-written file:
//!
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk
//! 3. Publish it under the final name in one step: `rename` to replace, or
//!    `hard_link` to create only if absent
//!
//! Source and destination must be on the same filesystem, which holds since
//! the temporary file is created next to the target.

use crate::error::{Result, RosterError};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Atomically write bytes to `path`, replacing any existing file.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RosterError::io(format!("failed to atomically replace '{}'", path.display()), e)
    })
}

/// Atomically create `path` with `content`, only if it does not exist yet.
///
/// Returns `Ok(false)` without touching the existing file when `path` is
/// already present. Of several concurrent callers exactly one gets `Ok(true)`.
pub fn atomic_create<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<bool> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;

    let linked = fs::hard_link(&temp_path, path);
    let _ = fs::remove_file(&temp_path);
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(RosterError::io(
            format!("failed to create '{}'", path.display()),
            e,
        )),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            RosterError::io(
                format!("failed to create parent directory '{}'", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}

/// `.{filename}.{random}.tmp` next to the target.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            RosterError::UserError(format!("invalid file path '{}'", target.display()))
        })?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(parent.join(format!(".{}.{}.tmp", filename, &suffix[..8])))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let result = File::create(path).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    result.map_err(|e| {
        let _ = fs::remove_file(path);
        RosterError::io(
            format!("failed to write temporary file '{}'", path.display()),
            e,
        )
    })
}
