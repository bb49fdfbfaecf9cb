//! Staging: where payloads are written before they become visible.
//!
//! A put writes the full payload to `staging/<uuid>.part`, optionally syncs
//! it, and then hard-links it to the final artifact path. Readers only ever
//! look at final paths, so they see either nothing or the complete file.
//! The staging file is removed when the `StagedFile` is dropped.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

/// A fully written payload waiting in the staging directory.
#[derive(Debug)]
pub(crate) struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Write `payload` to a fresh staging file in `dir`.
    pub(crate) fn write(dir: &Path, payload: &[u8], sync: bool) -> io::Result<Self> {
        let path = dir.join(format!("{}.part", Uuid::new_v4().simple()));
        let staged = Self { path };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staged.path)?;
        file.write_all(payload)?;
        if sync {
            file.sync_all()?;
        }

        Ok(staged)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Set the mtime the artifact will carry once linked into place.
    pub(crate) fn set_modified(&self, time: SystemTime) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)?
            .set_modified(time)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging file");
            }
        }
    }
}

/// Remove staging files left behind by a crash. Returns how many were removed.
pub(crate) fn clear_leftovers(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
