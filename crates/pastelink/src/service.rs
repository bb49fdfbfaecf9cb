//! PasteService: submit, resolve and status over an injected store.
//!
//! All methods do blocking store I/O. Async callers run them on
//! `spawn_blocking`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cas::{Artifact, ArtifactId, ArtifactKind, ArtifactStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::compose::{self, IndexSampler, RandomSampler};
use crate::error::{Error, Result};
use crate::ingest::{self, FormatSniffer, ImageSniffer};

/// Fresh ids tried for the final document before giving up on collisions.
const MAX_ID_ATTEMPTS: usize = 3;

/// A client submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(alias = "content")]
    pub text: String,
    /// Base64 payloads, optionally as data URLs.
    #[serde(default)]
    pub images: Vec<String>,
}

/// What a successful submission hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: ArtifactId,
    pub created_at: DateTime<Utc>,
    /// How many of the submitted images made it in.
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub artifact_count: usize,
    pub text_count: usize,
    pub image_count: usize,
    pub oldest_artifact_age: Option<Duration>,
    pub uptime: Duration,
}

pub struct PasteService {
    store: Arc<dyn ArtifactStore>,
    sniffer: Arc<dyn FormatSniffer>,
    footer: String,
    started: Instant,
}

impl std::fmt::Debug for PasteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteService")
            .field("footer", &self.footer)
            .finish_non_exhaustive()
    }
}

impl PasteService {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            sniffer: Arc::new(ImageSniffer),
            footer: String::new(),
            started: Instant::now(),
        }
    }

    pub fn with_sniffer(mut self, sniffer: Arc<dyn FormatSniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    /// Signature shown in every document's footer.
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Store a submission with randomly placed images.
    pub fn submit(&self, submission: Submission) -> Result<Receipt> {
        self.submit_with(submission, &mut RandomSampler::thread_local())
    }

    /// Store a submission, placing images with `sampler`.
    #[instrument(
        name = "paste.submit",
        skip(self, submission, sampler),
        fields(images = submission.images.len(), artifact.id = tracing::field::Empty)
    )]
    pub fn submit_with(
        &self,
        submission: Submission,
        sampler: &mut impl IndexSampler,
    ) -> Result<Receipt> {
        if submission.text.trim().is_empty() {
            return Err(Error::InvalidInput("content is required".to_string()));
        }

        let image_ids =
            ingest::ingest_images(self.store.as_ref(), self.sniffer.as_ref(), &submission.images);
        if image_ids.len() < submission.images.len() {
            tracing::info!(
                submitted = submission.images.len(),
                stored = image_ids.len(),
                "some images were dropped"
            );
        }

        let created_at = self.store.clock().now();
        let body = compose::compose(&submission.text, &image_ids, sampler);
        let body = compose::with_title(submission.title.as_deref(), &body);
        let document = compose::with_footer(&body, &self.footer, created_at);

        let salt = submission.title.as_deref().unwrap_or_default().as_bytes();
        let mut attempt = 0;
        let id = loop {
            attempt += 1;
            let id = ArtifactId::generate(submission.text.as_bytes(), salt);
            match self.store.put_at(&id, ArtifactKind::Text, document.as_bytes(), created_at) {
                Ok(()) => break id,
                Err(StoreError::AlreadyExists(taken)) if attempt < MAX_ID_ATTEMPTS => {
                    tracing::warn!(artifact.id = %taken, attempt, "id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::Span::current().record("artifact.id", tracing::field::display(&id));
        tracing::info!(artifact.id = %id, images = image_ids.len(), size = document.len(), "stored paste");

        Ok(Receipt {
            id,
            created_at,
            image_count: image_ids.len(),
        })
    }

    /// Look up an artifact by its id string. Malformed ids are `NotFound`.
    #[instrument(name = "paste.resolve", skip(self))]
    pub fn resolve(&self, id: &str) -> Result<Artifact> {
        let parsed: ArtifactId = id.parse().map_err(|e| {
            tracing::debug!(error = %e, "rejecting malformed id");
            Error::NotFound(id.to_string())
        })?;
        Ok(self.store.get(&parsed)?)
    }

    pub fn status(&self) -> Result<Status> {
        let stats = self.store.stats()?;
        let now = self.store.clock().now();
        Ok(Status {
            artifact_count: stats.artifact_count,
            text_count: stats.text_count,
            image_count: stats.image_count,
            oldest_artifact_age: stats.oldest_age(now),
            uptime: self.started.elapsed(),
        })
    }
}
