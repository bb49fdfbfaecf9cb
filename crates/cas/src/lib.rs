//! Write-once, expiring artifact storage for pastelink.
//!
//! Artifacts are either markdown text or images. Each gets an
//! [`ArtifactId`] when it is created, is never modified afterwards, and is
//! removed once it outlives the retention window.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cas::{ArtifactId, ArtifactKind, ArtifactStore, FileStore};
//! use std::time::Duration;
//!
//! let store = FileStore::at_path("/var/lib/pastelink").unwrap();
//!
//! let id = ArtifactId::generate(b"# Hello", b"");
//! store.put(&id, ArtifactKind::Text, b"# Hello").unwrap();
//!
//! let artifact = store.get(&id).unwrap();
//! println!("{} bytes, created {}", artifact.size(), artifact.created_at);
//!
//! // Everything older than a day
//! for expired in store.list_ids_older_than(Duration::from_secs(86_400)).unwrap() {
//!     store.delete(&expired).unwrap();
//! }
//! ```
//!
//! # Concurrency
//!
//! Stores are `Send + Sync` and shared behind an `Arc`. A `get` racing a
//! `delete` of the same id returns either the whole artifact or `NotFound`,
//! never a partial payload.

pub mod artifact;
pub mod clock;
pub mod config;
pub mod id;
pub mod memory;
mod staging;
pub mod store;

// Re-exports for convenience
pub use artifact::{Artifact, ArtifactKind, StoreStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CasConfig;
pub use id::{ArtifactId, IdError};
pub use memory::MemoryStore;
pub use store::{ArtifactStore, FileStore, StoreError};
