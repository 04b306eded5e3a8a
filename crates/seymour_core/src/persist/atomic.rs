//! Atomic file replacement.
//!
//! # Responsibility
//! - Replace a file so it is never observed partially written.
//!
//! # Invariants
//! - Sequence: write `<file>.tmp` and fsync, rotate an existing `<file>` to
//!   `<file>.bak`, rename the temp file into place, remove the backup.
//! - On failure the original is restored from `<file>.bak` and the temp file
//!   is removed.
//! - If restoring also fails, `<file>.bak` is left on disk and a
//!   `restore_failed` error event is logged.

use log::{error, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TEMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".bak";

/// Atomically replaces `path` with `bytes`, creating parent directories.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling(path, TEMP_SUFFIX);
    let backup_path = sibling(path, BACKUP_SUFFIX);

    if let Err(err) = write_synced(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    let rotated = match fs::rename(path, &backup_path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    };

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        if rotated {
            restore_backup(path, &backup_path);
        }
        return Err(err);
    }

    if rotated {
        if let Err(err) = fs::remove_file(&backup_path) {
            warn!(
                "event=atomic_write module=persist status=ok warning=backup_cleanup_failed path={} error={}",
                backup_path.display(),
                err
            );
        }
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn restore_backup(path: &Path, backup_path: &Path) {
    if let Err(err) = fs::rename(backup_path, path) {
        // Neither the new nor the original file is at `path` now; the only
        // surviving copy is the backup.
        error!(
            "event=atomic_write module=persist status=error error_code=restore_failed path={} backup={} error={}",
            path.display(),
            backup_path.display(),
            err
        );
    }
}

/// `<path><suffix>` in the same directory.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
