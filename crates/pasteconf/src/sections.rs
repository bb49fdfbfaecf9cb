//! Config sections. Each one has serde defaults so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where artifacts live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Artifact store root (holds `text/`, `images/` and `staging/`).
    /// Default: ~/.local/share/pastelink
    #[serde(default = "PathsConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl PathsConfig {
    fn default_data_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("pastelink"))
            .unwrap_or_else(|| PathBuf::from(".local/share/pastelink"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// Default: 8000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,

    /// Base URL used when building share links, e.g. `https://paste.example.com/`.
    /// When unset, links are built from the request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Largest accepted request body in bytes. Submissions carry base64
    /// images inline, so this bounds the total upload size.
    /// Default: 67108864 (64 MiB)
    #[serde(default = "BindConfig::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8000
    }

    fn default_max_body_bytes() -> usize {
        64 * 1024 * 1024
    }

    /// `host:port` for the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
            public_url: None,
            max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}

/// How long artifacts live and how often expired ones are reclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Default: 2592000 (30 days)
    #[serde(default = "RetentionConfig::default_max_age_secs")]
    pub max_age_secs: u64,

    /// Default: 86400 (24 hours)
    #[serde(default = "RetentionConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RetentionConfig {
    fn default_max_age_secs() -> u64 {
        30 * 24 * 60 * 60
    }

    fn default_sweep_interval_secs() -> u64 {
        24 * 60 * 60
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: Self::default_max_age_secs(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Rendering of submitted documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Signature placed in the footer before the timestamp. Default: empty.
    #[serde(default)]
    pub footer: String,
}
