//! pastelink: expiring text and image pastes behind short links.
//!
//! Submissions are stored as immutable artifacts in a [`cas`] store. Images
//! are ingested first, then woven into the text at paragraph breaks, and the
//! finished markdown document gets its own id. A background [`sweeper`]
//! removes artifacts once they outlive the retention window.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cas::FileStore;
//! use pastelink::{PasteService, Submission};
//!
//! let store = Arc::new(FileStore::at_path("/var/lib/pastelink").unwrap());
//! let service = PasteService::new(store);
//!
//! let receipt = service
//!     .submit(Submission {
//!         title: Some("Notes".to_string()),
//!         text: "first\n\nsecond".to_string(),
//!         images: vec![],
//!     })
//!     .unwrap();
//! let artifact = service.resolve(receipt.id.as_str()).unwrap();
//! ```

pub mod compose;
pub mod error;
pub mod ingest;
pub mod render;
pub mod service;
pub mod sweeper;
pub mod telemetry;
pub mod web;

pub use error::{Error, Result};
pub use service::{PasteService, Receipt, Status, Submission};
pub use sweeper::{RetentionPolicy, SweepPhase, SweepReport, Sweeper, SweeperHandle};
