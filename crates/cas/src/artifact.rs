//! Artifact types: what the store hands back and what it reports about itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::id::ArtifactId;

/// What an artifact holds.
///
/// Images carry the file extension picked by format sniffing; it doubles as
/// the on-disk extension and the source of the served MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKind {
    Text,
    Image { format: String },
}

impl ArtifactKind {
    /// Create an image kind, normalizing the format to lowercase.
    pub fn image(format: impl Into<String>) -> Self {
        Self::Image {
            format: format.into().to_ascii_lowercase(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// File extension used on disk.
    pub fn extension(&self) -> &str {
        match self {
            Self::Text => "txt",
            Self::Image { format } => format,
        }
    }

    /// MIME type to serve the payload with.
    pub fn mime_type(&self) -> String {
        match self {
            Self::Text => "text/markdown; charset=utf-8".to_string(),
            Self::Image { format } => match format.as_str() {
                "jpg" | "jpeg" => "image/jpeg".to_string(),
                "svg" => "image/svg+xml".to_string(),
                "ico" => "image/x-icon".to_string(),
                "tif" | "tiff" => "image/tiff".to_string(),
                other => format!("image/{other}"),
            },
        }
    }
}

/// An immutable stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// The payload as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Age relative to `now`; zero if `created_at` lies in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        age_at(self.created_at, now)
    }
}

/// Aggregate view of a store, used for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub artifact_count: usize,
    pub text_count: usize,
    pub image_count: usize,
    pub oldest_created_at: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub(crate) fn record(&mut self, kind: &ArtifactKind, created_at: DateTime<Utc>) {
        self.artifact_count += 1;
        if kind.is_image() {
            self.image_count += 1;
        } else {
            self.text_count += 1;
        }
        self.oldest_created_at = Some(match self.oldest_created_at {
            Some(oldest) if oldest <= created_at => oldest,
            _ => created_at,
        });
    }

    /// Age of the oldest artifact relative to `now`.
    pub fn oldest_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.oldest_created_at.map(|t| age_at(t, now))
    }
}

pub(crate) fn age_at(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(created_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Whether something created at `created_at` has reached `max_age` at `now`.
pub(crate) fn has_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match now.signed_duration_since(created_at).to_std() {
        Ok(elapsed) => elapsed >= max_age,
        Err(_) => false,
    }
}
