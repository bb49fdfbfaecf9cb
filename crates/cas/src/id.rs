//! ArtifactId: short, URL-safe artifact identifiers.
//!
//! An id is the first 10 hex chars of a BLAKE3 digest over the content, a
//! caller-supplied salt and the wall clock, followed by 4 random bytes in hex
//! (18 chars total). The digest prefix alone is short enough to collide; the
//! random suffix is what makes the full id unique.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Hex chars taken from the digest.
pub const DIGEST_CHARS: usize = 10;

/// Random bytes appended after the digest prefix.
pub const SUFFIX_BYTES: usize = 4;

/// Total length of an id in chars.
pub const ID_LEN: usize = DIGEST_CHARS + SUFFIX_BYTES * 2;

/// Identifier of a stored artifact (text or image).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

/// Errors that can occur when parsing an artifact id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid id length: expected {ID_LEN} chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid character in id: {0:?}")]
    InvalidChar(char),
}

impl ArtifactId {
    /// Derive a fresh id for `content`.
    ///
    /// Two calls with identical arguments still return different ids: the
    /// current time is mixed into the digest and the suffix is random.
    pub fn generate(content: &[u8], salt: &[u8]) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut salted = Vec::with_capacity(salt.len() + 16);
        salted.extend_from_slice(salt);
        salted.extend_from_slice(&nanos.to_le_bytes());

        Self::from_parts(content, &salted, rand::random())
    }

    /// Build an id from explicit parts, with no clock or randomness involved.
    pub fn from_parts(content: &[u8], salt: &[u8], suffix: [u8; SUFFIX_BYTES]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(content);
        hasher.update(salt);
        let digest = hasher.finalize();

        let mut id = hex::encode(&digest.as_bytes()[..DIGEST_CHARS / 2]);
        id.push_str(&hex::encode(suffix));
        Self(id)
    }

    /// Parse an id, accepting upper or lower case hex.
    pub fn from_str_checked(s: &str) -> Result<Self, IdError> {
        if s.len() != ID_LEN {
            return Err(IdError::InvalidLength(s.len()));
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidChar(bad));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The digest-derived part of the id.
    pub fn digest_prefix(&self) -> &str {
        &self.0[..DIGEST_CHARS]
    }

    /// The random part of the id.
    pub fn suffix(&self) -> &str {
        &self.0[DIGEST_CHARS..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl TryFrom<&str> for ArtifactId {
    type Error = IdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str_checked(value)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str_checked(&value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_shape() {
        let id = ArtifactId::generate(b"Hello, World!", b"salt");
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_generate_same_content_differs() {
        let ids: HashSet<_> = (0..100)
            .map(|_| ArtifactId::generate(b"same text", b""))
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_generate_empty_content() {
        let id = ArtifactId::generate(b"", b"");
        assert_eq!(id.as_str().len(), ID_LEN);
    }

    #[test]
    fn test_from_parts_is_deterministic() {
        let a = ArtifactId::from_parts(b"content", b"salt", [1, 2, 3, 4]);
        let b = ArtifactId::from_parts(b"content", b"salt", [1, 2, 3, 4]);
        assert_eq!(a, b);
        assert_eq!(a.suffix(), "01020304");
    }

    #[test]
    fn test_salt_changes_prefix() {
        let a = ArtifactId::from_parts(b"content", b"one", [0; 4]);
        let b = ArtifactId::from_parts(b"content", b"two", [0; 4]);
        assert_ne!(a.digest_prefix(), b.digest_prefix());
        assert_eq!(a.suffix(), b.suffix());
    }

    #[test]
    fn test_prefix_matches_blake3() {
        let id = ArtifactId::from_parts(b"abc", b"", [0xde, 0xad, 0xbe, 0xef]);
        let expected = &blake3::hash(b"abc").to_hex()[..DIGEST_CHARS];
        assert_eq!(id.digest_prefix(), expected);
        assert_eq!(id.suffix(), "deadbeef");
    }

    #[test]
    fn test_parse_valid_uppercase() {
        let id: ArtifactId = "ABCDEF0123456789AB".parse().unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789ab");
    }

    #[test]
    fn test_parse_invalid_length() {
        let result: Result<ArtifactId, _> = "short".parse();
        assert_eq!(result, Err(IdError::InvalidLength(5)));
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        let result: Result<ArtifactId, _> = "../../etc/passwd00".parse();
        assert_eq!(result, Err(IdError::InvalidChar('.')));
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let id = ArtifactId::generate(b"serde", b"");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let bad: Result<ArtifactId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
    }
}
