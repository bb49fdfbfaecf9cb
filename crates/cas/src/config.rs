//! Store configuration.
//!
//! Layout under `base_path`:
//! ```text
//! {base_path}/
//! ├── staging/   # in-flight writes
//! ├── text/      # <id>.txt
//! └── images/    # <id>.<ext>
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a `FileStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasConfig {
    /// Root directory for all artifacts.
    pub base_path: PathBuf,

    /// Read-only mode - rejects put and delete.
    #[serde(default)]
    pub read_only: bool,

    /// fsync staged payloads before linking them into place.
    /// Turning this off speeds up tests on slow disks.
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

fn default_true() -> bool {
    true
}

impl CasConfig {
    /// Create a writable config rooted at `path`.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            read_only: false,
            sync_writes: true,
        }
    }

    /// Create a read-only config rooted at `path`.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            read_only: true,
            sync_writes: false,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn text_dir(&self) -> PathBuf {
        self.base_path.join("text")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base_path.join("images")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.base_path.join("staging")
    }
}
