//! FileStore: one file per artifact, written once, deleted once.
//!
//! Implements the ArtifactStore trait on a local directory (see `config` for
//! the layout). Writes go through `staging` and are hard-linked into place,
//! which fails atomically if the target exists. That gives write-once
//! semantics and means readers never see a partial file.
//!
//! An in-memory index maps id -> (kind, created_at). It is rebuilt from the
//! directory at open, with `created_at` taken from file mtimes. The index lock
//! is held only for map operations, never across file I/O.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::artifact::{has_expired, Artifact, ArtifactKind, StoreStats};
use crate::clock::{Clock, SystemClock};
use crate::config::CasConfig;
use crate::id::ArtifactId;
use crate::staging::{self, StagedFile};

/// Errors returned by artifact stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    #[error("artifact already exists: {0}")]
    AlreadyExists(ArtifactId),

    #[error("artifact store is in read-only mode")]
    ReadOnly,

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Trait for artifact storage backends.
///
/// Implementations must be safe to share across request handlers and the
/// retention sweeper. Each call is individually atomic; none of them
/// requires the caller to hold a lock.
pub trait ArtifactStore: Send + Sync {
    /// Persist a new artifact stamped with the store clock's current time.
    fn put(&self, id: &ArtifactId, kind: ArtifactKind, payload: &[u8]) -> Result<(), StoreError> {
        self.put_at(id, kind, payload, self.clock().now())
    }

    /// Persist a new artifact with an explicit creation time. Fails with
    /// `AlreadyExists` rather than overwriting. Once this returns, `get` on
    /// the same id sees the payload and `created_at`.
    fn put_at(
        &self,
        id: &ArtifactId,
        kind: ArtifactKind,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Fetch an artifact by id.
    fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError>;

    /// Delete an artifact. Deleting a missing id is not an error.
    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError>;

    /// Snapshot of ids whose age is at least `age`, oldest first.
    fn list_ids_older_than(&self, age: Duration) -> Result<Vec<ArtifactId>, StoreError>;

    /// Counts and oldest creation time.
    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// The clock used for creation stamps and age checks.
    fn clock(&self) -> &dyn Clock;

    /// Check if an artifact exists.
    fn contains(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        match self.get(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    kind: ArtifactKind,
    created_at: DateTime<Utc>,
}

/// Filesystem-backed artifact store.
#[derive(Debug)]
pub struct FileStore {
    config: CasConfig,
    clock: Arc<dyn Clock>,
    index: RwLock<HashMap<ArtifactId, IndexEntry>>,
}

impl FileStore {
    /// Open a store with the system clock.
    ///
    /// Creates the directories if needed (unless read-only), clears
    /// leftover staging files and indexes existing artifacts.
    pub fn new(config: CasConfig) -> Result<Self, StoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open a store with a specific clock.
    pub fn with_clock(config: CasConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if !config.read_only {
            for dir in [config.text_dir(), config.images_dir(), config.staging_dir()] {
                fs::create_dir_all(&dir).map_err(|e| {
                    StoreError::io(format!("failed to create {}", dir.display()), e)
                })?;
            }

            let cleared = staging::clear_leftovers(&config.staging_dir())
                .map_err(|e| StoreError::io("failed to clear staging directory", e))?;
            if cleared > 0 {
                tracing::warn!(cleared, "removed leftover staging files");
            }
        }

        let mut index = HashMap::new();
        index_dir(&config.text_dir(), false, &mut index)?;
        index_dir(&config.images_dir(), true, &mut index)?;

        tracing::debug!(
            base_path = %config.base_path.display(),
            artifacts = index.len(),
            "opened artifact store"
        );

        Ok(Self {
            config,
            clock,
            index: RwLock::new(index),
        })
    }

    /// Open a writable store at a specific path.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(CasConfig::with_base_path(path))
    }

    /// Open a read-only store at a specific path.
    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(CasConfig::read_only(path))
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    /// Where an artifact of this kind lives on disk.
    pub fn artifact_path(&self, id: &ArtifactId, kind: &ArtifactKind) -> PathBuf {
        let dir = if kind.is_image() {
            self.config.images_dir()
        } else {
            self.config.text_dir()
        };
        dir.join(format!("{}.{}", id, kind.extension()))
    }

    fn read_index(&self) -> RwLockReadGuard<'_, HashMap<ArtifactId, IndexEntry>> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, HashMap<ArtifactId, IndexEntry>> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Add every `<id>.<ext>` file in `dir` to the index.
fn index_dir(
    dir: &Path,
    images: bool,
    index: &mut HashMap<ArtifactId, IndexEntry>,
) -> Result<(), StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::io(format!("failed to list {}", dir.display()), e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io("failed to read directory entry", e))?;
        let path = entry.path();
        let Some((id, ext)) = parse_file_name(&path) else {
            tracing::debug!(path = %path.display(), "skipping unrecognized file");
            continue;
        };

        let kind = if images {
            ArtifactKind::image(ext)
        } else if ext == "txt" {
            ArtifactKind::Text
        } else {
            tracing::debug!(path = %path.display(), "skipping non-text file in text directory");
            continue;
        };

        let metadata = entry
            .metadata()
            .map_err(|e| StoreError::io(format!("failed to stat {}", path.display()), e))?;
        if !metadata.is_file() {
            continue;
        }
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| StoreError::io(format!("failed to read mtime of {}", path.display()), e))?;

        if index.contains_key(&id) {
            tracing::warn!(artifact.id = %id, path = %path.display(), "duplicate artifact id on disk, keeping first");
            continue;
        }
        index.insert(id, IndexEntry { kind, created_at });
    }

    Ok(())
}

fn parse_file_name(path: &Path) -> Option<(ArtifactId, &str)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    let id = stem.parse().ok()?;
    Some((id, ext))
}

impl ArtifactStore for FileStore {
    fn put_at(
        &self,
        id: &ArtifactId,
        kind: ArtifactKind,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        if self.read_index().contains_key(id) {
            return Err(StoreError::AlreadyExists(id.clone()));
        }

        let final_path = self.artifact_path(id, &kind);
        let staged = StagedFile::write(&self.config.staging_dir(), payload, self.config.sync_writes)
            .map_err(|e| StoreError::io("failed to write staging file", e))?;
        // Reopening rebuilds created_at from mtime
        staged
            .set_modified(SystemTime::from(created_at))
            .map_err(|e| StoreError::io("failed to stamp staging file", e))?;

        match fs::hard_link(staged.path(), &final_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(id.clone()));
            }
            Err(e) => return Err(StoreError::io("failed to link artifact into place", e)),
        }
        drop(staged);

        match self.write_index().entry(id.clone()) {
            Entry::Occupied(_) => {
                // Same id raced in under another kind; ours loses.
                let _ = fs::remove_file(&final_path);
                return Err(StoreError::AlreadyExists(id.clone()));
            }
            Entry::Vacant(slot) => {
                slot.insert(IndexEntry { kind, created_at });
            }
        }

        tracing::debug!(artifact.id = %id, size = payload.len(), "stored artifact");
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        let entry = self
            .read_index()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let path = self.artifact_path(id, &entry.kind);
        match fs::read(&path) {
            Ok(payload) => Ok(Artifact {
                id: id.clone(),
                kind: entry.kind,
                payload,
                created_at: entry.created_at,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(e) => Err(StoreError::io(format!("failed to read {}", path.display()), e)),
        }
    }

    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }

        let Some(entry) = self.write_index().remove(id) else {
            return Ok(());
        };

        let path = self.artifact_path(id, &entry.kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                // Keep it indexed so a later sweep retries.
                self.write_index().entry(id.clone()).or_insert(entry);
                Err(StoreError::io(format!("failed to remove {}", path.display()), e))
            }
        }
    }

    fn list_ids_older_than(&self, age: Duration) -> Result<Vec<ArtifactId>, StoreError> {
        let now = self.clock.now();
        let mut expired: Vec<(DateTime<Utc>, ArtifactId)> = self
            .read_index()
            .iter()
            .filter(|(_, entry)| has_expired(entry.created_at, now, age))
            .map(|(id, entry)| (entry.created_at, id.clone()))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for entry in self.read_index().values() {
            stats.record(&entry.kind, entry.created_at);
        }
        Ok(stats)
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::thread;
    use tempfile::TempDir;

    fn test_store() -> Result<(FileStore, TempDir), StoreError> {
        let temp_dir = TempDir::new().map_err(|e| StoreError::io("tempdir", e))?;
        let mut config = CasConfig::with_base_path(temp_dir.path());
        config.sync_writes = false;
        Ok((FileStore::new(config)?, temp_dir))
    }

    fn manual_store(clock: Arc<ManualClock>) -> Result<(FileStore, TempDir), StoreError> {
        let temp_dir = TempDir::new().map_err(|e| StoreError::io("tempdir", e))?;
        let store = FileStore::with_clock(CasConfig::with_base_path(temp_dir.path()), clock)?;
        Ok((store, temp_dir))
    }

    #[test]
    fn test_put_and_get_text() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let id = ArtifactId::generate(b"Hello, World!", b"");

        store.put(&id, ArtifactKind::Text, b"Hello, World!")?;

        let artifact = store.get(&id)?;
        assert_eq!(artifact.id, id);
        assert_eq!(artifact.kind, ArtifactKind::Text);
        assert_eq!(artifact.text(), Some("Hello, World!"));
        Ok(())
    }

    #[test]
    fn test_layout_on_disk() -> Result<(), StoreError> {
        let (store, temp) = test_store()?;
        let text_id = ArtifactId::generate(b"text", b"");
        let image_id = ArtifactId::generate(b"image", b"");

        store.put(&text_id, ArtifactKind::Text, b"text")?;
        store.put(&image_id, ArtifactKind::image("png"), b"\x89PNG")?;

        assert!(temp.path().join("text").join(format!("{text_id}.txt")).is_file());
        assert!(temp.path().join("images").join(format!("{image_id}.png")).is_file());
        assert_eq!(fs::read_dir(temp.path().join("staging")).map(|d| d.count()).unwrap_or(0), 0);
        Ok(())
    }

    #[test]
    fn test_put_existing_id_fails() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let id = ArtifactId::generate(b"once", b"");

        store.put(&id, ArtifactKind::Text, b"first")?;
        let result = store.put(&id, ArtifactKind::Text, b"second");
        assert!(matches!(result, Err(StoreError::AlreadyExists(ref dup)) if dup == &id));

        // Original payload is untouched
        assert_eq!(store.get(&id)?.payload, b"first");
        Ok(())
    }

    #[test]
    fn test_put_existing_file_not_in_index_fails() -> Result<(), StoreError> {
        let (store, temp) = test_store()?;
        let id = ArtifactId::generate(b"external", b"");
        fs::write(temp.path().join("text").join(format!("{id}.txt")), b"external")
            .map_err(|e| StoreError::io("seed", e))?;

        let result = store.put(&id, ArtifactKind::Text, b"mine");
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        Ok(())
    }

    #[test]
    fn test_get_missing() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let id = ArtifactId::generate(b"missing", b"");
        assert!(store.get(&id).unwrap_err().is_not_found());
        assert!(!store.contains(&id)?);
        Ok(())
    }

    #[test]
    fn test_delete_is_idempotent() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let id = ArtifactId::generate(b"delete me", b"");

        store.put(&id, ArtifactKind::Text, b"delete me")?;
        store.delete(&id)?;
        assert!(store.get(&id).unwrap_err().is_not_found());

        store.delete(&id)?;
        Ok(())
    }

    #[test]
    fn test_reopen_sees_artifacts() -> Result<(), StoreError> {
        let temp = TempDir::new().map_err(|e| StoreError::io("tempdir", e))?;
        let text_id = ArtifactId::generate(b"persist", b"");
        let image_id = ArtifactId::generate(b"persist image", b"");

        {
            let store = FileStore::at_path(temp.path())?;
            store.put(&text_id, ArtifactKind::Text, b"persist")?;
            store.put(&image_id, ArtifactKind::image("gif"), b"GIF89a")?;
        }

        let store = FileStore::at_path(temp.path())?;
        assert_eq!(store.get(&text_id)?.text(), Some("persist"));
        let image = store.get(&image_id)?;
        assert_eq!(image.kind, ArtifactKind::image("gif"));
        assert_eq!(image.payload, b"GIF89a");
        assert_eq!(store.stats()?.artifact_count, 2);
        Ok(())
    }

    #[test]
    fn test_put_at_keeps_given_time_across_reopen() -> Result<(), StoreError> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stamped = Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let (store, temp) = manual_store(clock.clone())?;
        let id = ArtifactId::generate(b"dated", b"");

        store.put_at(&id, ArtifactKind::Text, b"dated", stamped)?;
        assert_eq!(store.get(&id)?.created_at, stamped);
        drop(store);

        let reopened = FileStore::with_clock(CasConfig::with_base_path(temp.path()), clock)?;
        assert_eq!(reopened.get(&id)?.created_at, stamped);
        Ok(())
    }

    #[test]
    fn test_open_skips_foreign_files_and_clears_staging() -> Result<(), StoreError> {
        let temp = TempDir::new().map_err(|e| StoreError::io("tempdir", e))?;
        {
            FileStore::at_path(temp.path())?;
        }
        let seed = |path: PathBuf| fs::write(path, b"x").map_err(|e| StoreError::io("seed", e));
        seed(temp.path().join("text").join("README"))?;
        seed(temp.path().join("text").join("not-an-id.txt"))?;
        seed(temp.path().join("staging").join("crashed.part"))?;

        let store = FileStore::at_path(temp.path())?;
        assert_eq!(store.stats()?.artifact_count, 0);
        assert!(!temp.path().join("staging").join("crashed.part").exists());
        Ok(())
    }

    #[test]
    fn test_list_ids_older_than() -> Result<(), StoreError> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let (store, _temp) = manual_store(clock.clone())?;

        let old = ArtifactId::generate(b"old", b"");
        store.put(&old, ArtifactKind::Text, b"old")?;
        clock.advance(Duration::from_secs(3600));
        let young = ArtifactId::generate(b"young", b"");
        store.put(&young, ArtifactKind::Text, b"young")?;

        let max_age = Duration::from_secs(7200);
        assert!(store.list_ids_older_than(max_age)?.is_empty());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.list_ids_older_than(max_age)?, vec![old.clone()]);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.list_ids_older_than(max_age)?, vec![old, young]);
        Ok(())
    }

    #[test]
    fn test_listing_skips_deleted() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let a = ArtifactId::generate(b"a", b"");
        let b = ArtifactId::generate(b"b", b"");
        store.put(&a, ArtifactKind::Text, b"a")?;
        store.put(&b, ArtifactKind::Text, b"b")?;

        store.delete(&a)?;
        assert_eq!(store.list_ids_older_than(Duration::ZERO)?, vec![b]);
        Ok(())
    }

    #[test]
    fn test_stats() -> Result<(), StoreError> {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let (store, _temp) = manual_store(clock.clone())?;

        store.put(&ArtifactId::generate(b"1", b""), ArtifactKind::Text, b"1")?;
        clock.advance(Duration::from_secs(10));
        store.put(&ArtifactId::generate(b"2", b""), ArtifactKind::image("png"), b"2")?;

        let stats = store.stats()?;
        assert_eq!(stats.artifact_count, 2);
        assert_eq!(stats.text_count, 1);
        assert_eq!(stats.image_count, 1);
        assert_eq!(stats.oldest_created_at, Some(t0));
        Ok(())
    }

    #[test]
    fn test_read_only_prevents_writes() -> Result<(), StoreError> {
        let temp = TempDir::new().map_err(|e| StoreError::io("tempdir", e))?;
        let id = ArtifactId::generate(b"readable", b"");
        FileStore::at_path(temp.path())?.put(&id, ArtifactKind::Text, b"readable")?;

        let readonly = FileStore::read_only_at(temp.path())?;
        assert_eq!(readonly.get(&id)?.payload, b"readable");

        let other = ArtifactId::generate(b"nope", b"");
        assert!(matches!(
            readonly.put(&other, ArtifactKind::Text, b"nope"),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(readonly.delete(&id), Err(StoreError::ReadOnly)));
        Ok(())
    }

    #[test]
    fn test_concurrent_puts_same_id() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let store = Arc::new(store);
        let id = ArtifactId::generate(b"contended", b"");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let id = id.clone();
                thread::spawn(move || store.put(&id, ArtifactKind::Text, format!("writer {i}").as_bytes()))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("writer panicked"))
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(winners, 1);
        assert!(store.get(&id)?.text().unwrap_or_default().starts_with("writer "));
        Ok(())
    }

    #[test]
    fn test_reads_race_deletes_without_partial_data() -> Result<(), StoreError> {
        let (store, _temp) = test_store()?;
        let store = Arc::new(store);
        let payload = vec![7u8; 256 * 1024];

        let ids: Vec<_> = (0..16)
            .map(|i| ArtifactId::generate(format!("race {i}").as_bytes(), b""))
            .collect();
        for id in &ids {
            store.put(id, ArtifactKind::image("png"), &payload)?;
        }

        let reader = {
            let store = store.clone();
            let ids = ids.clone();
            let expected = payload.clone();
            thread::spawn(move || {
                for id in &ids {
                    match store.get(id) {
                        Ok(artifact) => assert_eq!(artifact.payload, expected),
                        Err(e) => assert!(e.is_not_found()),
                    }
                }
            })
        };
        for id in &ids {
            store.delete(id)?;
        }
        reader.join().expect("reader panicked");

        assert_eq!(store.stats()?.artifact_count, 0);
        Ok(())
    }
}
