//! Configuration loading for pastelink.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pasteconf::PasteConfig;
//!
//! let config = PasteConfig::load().expect("Failed to load config");
//! println!("Data dir: {}", config.paths.data_dir.display());
//! println!("Artifacts live for {:?}", config.retention.max_age());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/pastelink/config.toml` (system)
//! 2. `~/.config/pastelink/config.toml` (user)
//! 3. `./pastelink.toml` or the `--config` path (local override)
//! 4. Environment variables (`PASTELINK_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! data_dir = "~/.local/share/pastelink"
//!
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8000
//! public_url = "https://paste.example.com/"
//! max_body_bytes = 67108864
//!
//! [retention]
//! max_age_secs = 2592000
//! sweep_interval_secs = 86400
//!
//! [telemetry]
//! log_level = "info"
//!
//! [page]
//! footer = "shared via pastelink"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{BindConfig, PageConfig, PathsConfig, RetentionConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete pastelink configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub page: PageConfig,
}

impl PasteConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, preferring `config_path` over `./pastelink.toml`.
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    ///
    /// The result is validated; a zero retention window or sweep interval is
    /// an error rather than a silently disabled sweeper.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = PasteConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_file_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention.max_age_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "retention.max_age_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "retention.sweep_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.bind.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "bind.max_body_bytes",
                message: "must be greater than zero".to_string(),
            });
        }
        if let Some(url) = &self.bind.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    field: "bind.public_url",
                    message: format!("expected an http(s) URL, got {url:?}"),
                });
            }
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so the section order and comments stay stable
        let mut output = String::new();

        output.push_str("# pastelink configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "data_dir = {}\n",
            toml_string(&self.paths.data_dir.to_string_lossy())
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = {}\n", toml_string(&self.bind.host)));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));
        match &self.bind.public_url {
            Some(url) => output.push_str(&format!("public_url = {}\n", toml_string(url))),
            None => output.push_str("# public_url = \"https://paste.example.com/\"\n"),
        }
        output.push_str(&format!("max_body_bytes = {}\n", self.bind.max_body_bytes));

        output.push_str("\n[retention]\n");
        output.push_str(&format!(
            "max_age_secs = {}\n",
            self.retention.max_age_secs
        ));
        output.push_str(&format!(
            "sweep_interval_secs = {}\n",
            self.retention.sweep_interval_secs
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml_string(&self.telemetry.log_level)
        ));

        output.push_str("\n[page]\n");
        output.push_str(&format!("footer = {}\n", toml_string(&self.page.footer)));

        output
    }
}

/// A TOML string literal for `value`, escaped as needed.
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
