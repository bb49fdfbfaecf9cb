//! MemoryStore: a HashMap behind a RwLock.
//!
//! Same contract as `FileStore`, nothing touches disk. Used by tests and by
//! callers that don't need artifacts to survive a restart.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::artifact::{has_expired, Artifact, ArtifactKind, StoreStats};
use crate::clock::{Clock, SystemClock};
use crate::id::ArtifactId;
use crate::store::{ArtifactStore, StoreError};

#[derive(Debug)]
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    artifacts: RwLock<HashMap<ArtifactId, Artifact>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            artifacts: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryStore {
    fn put_at(
        &self,
        id: &ArtifactId,
        kind: ArtifactKind,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
        match artifacts.entry(id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Artifact {
                    id: id.clone(),
                    kind,
                    payload: payload.to_vec(),
                    created_at,
                });
                Ok(())
            }
        }
    }

    fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn delete(&self, id: &ArtifactId) -> Result<(), StoreError> {
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    fn list_ids_older_than(&self, age: Duration) -> Result<Vec<ArtifactId>, StoreError> {
        let now = self.clock.now();
        let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        let mut expired: Vec<_> = artifacts
            .values()
            .filter(|a| has_expired(a.created_at, now, age))
            .map(|a| (a.created_at, a.id.clone()))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for artifact in self.artifacts.read().unwrap_or_else(PoisonError::into_inner).values() {
            stats.record(&artifact.kind, artifact.created_at);
        }
        Ok(stats)
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
