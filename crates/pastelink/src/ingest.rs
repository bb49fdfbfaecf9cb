//! Image ingestion: base64 entries in, stored image ids out.
//!
//! Each entry is handled on its own. A bad entry (undecodable, empty, or a
//! store failure) is logged and skipped; the rest still go through, and the
//! returned ids keep the input order.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cas::{ArtifactId, ArtifactKind, ArtifactStore};

use crate::error::{Error, Result};

/// Extension used when the format can't be detected.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Detects an image format from its leading bytes.
pub trait FormatSniffer: Send + Sync {
    /// Lowercase file extension for the detected format, if any.
    fn sniff(&self, bytes: &[u8]) -> Option<String>;
}

/// Magic-byte detection backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSniffer;

impl FormatSniffer for ImageSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<String> {
        let format = image::guess_format(bytes).ok()?;
        format.extensions_str().first().map(|ext| ext.to_string())
    }
}

/// Decode one client entry: optional `data:...;base64,` prefix, then base64.
///
/// The MIME type in a data URL is ignored; the payload is sniffed instead.
/// Whitespace inside the payload (line-wrapped base64) is dropped.
pub fn decode_entry(entry: &str) -> Result<Vec<u8>> {
    let entry = entry.trim();
    let encoded = match entry.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::InvalidInput("data URL without payload".to_string()))?,
        None => entry,
    };

    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(&compact)
        .map_err(|e| Error::InvalidInput(format!("invalid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(Error::InvalidInput("empty image".to_string()));
    }
    Ok(bytes)
}

/// Persist every decodable entry as an image artifact.
///
/// Blank entries are skipped silently; failures are logged with the entry
/// index. Never fails as a whole.
pub fn ingest_images(
    store: &dyn ArtifactStore,
    sniffer: &dyn FormatSniffer,
    entries: &[String],
) -> Vec<ArtifactId> {
    let mut ids = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            continue;
        }

        let bytes = match decode_entry(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping image");
                continue;
            }
        };

        let format = sniffer
            .sniff(&bytes)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let id = ArtifactId::generate(&bytes, format!("image:{index}").as_bytes());

        match store.put(&id, ArtifactKind::image(format.as_str()), &bytes) {
            Ok(()) => {
                tracing::debug!(index, artifact.id = %id, format = %format, size = bytes.len(), "stored image");
                ids.push(id);
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "failed to store image");
            }
        }
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas::MemoryStore;
    use std::io;
    use std::sync::{Arc, Mutex};

    // 1x1 transparent PNG
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
    const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

    fn b64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_image_sniffer() {
        let png = STANDARD.decode(PNG_B64).unwrap();
        assert_eq!(ImageSniffer.sniff(&png).as_deref(), Some("png"));
        assert_eq!(ImageSniffer.sniff(GIF_BYTES).as_deref(), Some("gif"));
        assert_eq!(ImageSniffer.sniff(&[0xff, 0xd8, 0xff, 0xe0]).as_deref(), Some("jpg"));
        assert_eq!(ImageSniffer.sniff(b"plain text"), None);
    }

    #[test]
    fn test_decode_entry_strips_data_url() {
        let plain = decode_entry(PNG_B64).unwrap();
        let with_prefix = decode_entry(&format!("data:image/png;base64,{PNG_B64}")).unwrap();
        assert_eq!(plain, with_prefix);
    }

    #[test]
    fn test_decode_entry_accepts_wrapped_base64() {
        let (head, tail) = PNG_B64.split_at(40);
        let wrapped = format!("{head}\n{tail}");
        assert_eq!(decode_entry(&wrapped).unwrap(), decode_entry(PNG_B64).unwrap());

        let crlf = format!("data:image/png;base64,{head}\r\n  {tail}\n");
        assert_eq!(decode_entry(&crlf).unwrap(), decode_entry(PNG_B64).unwrap());
    }

    #[test]
    fn test_wrapped_entry_is_stored() {
        let store = MemoryStore::new();
        let wrapped: String = STANDARD
            .encode(STANDARD.decode(PNG_B64).unwrap())
            .as_bytes()
            .chunks(16)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();

        let ids = ingest_images(&store, &ImageSniffer, &[wrapped]);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.get(&ids[0]).unwrap().kind, ArtifactKind::image("png"));
    }

    #[test]
    fn test_decode_entry_errors() {
        assert!(matches!(decode_entry("not base64!!"), Err(Error::InvalidInput(_))));
        assert!(matches!(decode_entry("data:image/png;base64"), Err(Error::InvalidInput(_))));
        assert!(matches!(decode_entry("data:image/png;base64,"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_partial_failure_keeps_order() {
        let store = MemoryStore::new();
        let entries = vec![
            PNG_B64.to_string(),
            "%%% definitely not base64 %%%".to_string(),
            b64(GIF_BYTES),
        ];

        let ids = ingest_images(&store, &ImageSniffer, &entries);
        assert_eq!(ids.len(), 2);
        assert_eq!(store.get(&ids[0]).unwrap().kind, ArtifactKind::image("png"));
        assert_eq!(store.get(&ids[1]).unwrap().kind, ArtifactKind::image("gif"));
        assert_eq!(store.len(), 2);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_failure_logs_each_bad_entry() {
        let store = MemoryStore::new();
        let entries = vec![
            PNG_B64.to_string(),
            "%%% definitely not base64 %%%".to_string(),
            b64(GIF_BYTES),
        ];

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let ids = tracing::subscriber::with_default(subscriber, || {
            ingest_images(&store, &ImageSniffer, &entries)
        });
        assert_eq!(ids.len(), 2);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let warnings: Vec<_> = output.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1, "log output: {output}");
        assert!(warnings[0].contains("skipping image"));
        assert!(warnings[0].contains("index=1"));
    }

    #[test]
    fn test_unknown_format_defaults_to_jpg() {
        let store = MemoryStore::new();
        let ids = ingest_images(&store, &ImageSniffer, &[b64(b"mystery bytes")]);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.get(&ids[0]).unwrap().kind.extension(), "jpg");
    }

    #[test]
    fn test_client_mime_is_not_trusted() {
        let store = MemoryStore::new();
        let entry = format!("data:image/jpeg;base64,{}", b64(GIF_BYTES));
        let ids = ingest_images(&store, &ImageSniffer, &[entry]);
        assert_eq!(store.get(&ids[0]).unwrap().kind, ArtifactKind::image("gif"));
    }

    #[test]
    fn test_blank_entries_skipped() {
        let store = MemoryStore::new();
        let ids = ingest_images(&store, &ImageSniffer, &["".to_string(), "   ".to_string()]);
        assert!(ids.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_identical_images_get_distinct_ids() {
        let store = MemoryStore::new();
        let ids = ingest_images(&store, &ImageSniffer, &[PNG_B64.to_string(), PNG_B64.to_string()]);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }
}
