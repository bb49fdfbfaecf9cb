//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, PasteConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/pastelink/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("pastelink/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("pastelink.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn load_file_into(config: &mut PasteConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay the keys present in `contents` onto `config`. Absent keys keep
/// whatever earlier layers set.
pub fn apply_toml(config: &mut PasteConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_err(e.to_string()))?;

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("data_dir").and_then(|v| v.as_str()) {
            config.paths.data_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.bind.http_port = u16::try_from(v)
                .map_err(|_| parse_err(format!("bind.http_port out of range: {v}")))?;
        }
        if let Some(v) = bind.get("public_url").and_then(|v| v.as_str()) {
            config.bind.public_url = Some(v.to_string());
        }
        if let Some(v) = bind.get("max_body_bytes").and_then(|v| v.as_integer()) {
            config.bind.max_body_bytes = usize::try_from(v)
                .map_err(|_| parse_err(format!("bind.max_body_bytes must not be negative: {v}")))?;
        }
    }

    if let Some(retention) = table.get("retention").and_then(|v| v.as_table()) {
        if let Some(v) = retention.get("max_age_secs").and_then(|v| v.as_integer()) {
            config.retention.max_age_secs = u64::try_from(v)
                .map_err(|_| parse_err(format!("retention.max_age_secs must not be negative: {v}")))?;
        }
        if let Some(v) = retention.get("sweep_interval_secs").and_then(|v| v.as_integer()) {
            config.retention.sweep_interval_secs = u64::try_from(v).map_err(|_| {
                parse_err(format!("retention.sweep_interval_secs must not be negative: {v}"))
            })?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    if let Some(page) = table.get("page").and_then(|v| v.as_table()) {
        if let Some(v) = page.get("footer").and_then(|v| v.as_str()) {
            config.page.footer = v.to_string();
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut PasteConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup. Unparseable numbers are ignored.
pub fn apply_overrides_from<F>(config: &mut PasteConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut record = |key: &str| sources.env_overrides.push(key.to_string());

    if let Some(v) = lookup("PASTELINK_DATA_DIR") {
        config.paths.data_dir = expand_path(&v);
        record("PASTELINK_DATA_DIR");
    }

    if let Some(v) = lookup("PASTELINK_HTTP_HOST") {
        config.bind.host = v;
        record("PASTELINK_HTTP_HOST");
    }
    if let Some(port) = lookup("PASTELINK_HTTP_PORT").and_then(|v| v.parse().ok()) {
        config.bind.http_port = port;
        record("PASTELINK_HTTP_PORT");
    }
    if let Some(v) = lookup("PASTELINK_PUBLIC_URL") {
        config.bind.public_url = Some(v);
        record("PASTELINK_PUBLIC_URL");
    }
    if let Some(bytes) = lookup("PASTELINK_MAX_BODY_BYTES").and_then(|v| v.parse().ok()) {
        config.bind.max_body_bytes = bytes;
        record("PASTELINK_MAX_BODY_BYTES");
    }

    if let Some(secs) = lookup("PASTELINK_MAX_AGE_SECS").and_then(|v| v.parse().ok()) {
        config.retention.max_age_secs = secs;
        record("PASTELINK_MAX_AGE_SECS");
    }
    if let Some(secs) = lookup("PASTELINK_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.retention.sweep_interval_secs = secs;
        record("PASTELINK_SWEEP_INTERVAL_SECS");
    }

    if let Some(v) = lookup("PASTELINK_LOG_LEVEL") {
        config.telemetry.log_level = v;
        record("PASTELINK_LOG_LEVEL");
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        record("RUST_LOG");
    }

    if let Some(v) = lookup("PASTELINK_FOOTER") {
        config.page.footer = v;
        record("PASTELINK_FOOTER");
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(stripped),
            None => PathBuf::from(path),
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        match stripped.split_once('/') {
            Some((var_name, rest)) => env::var(var_name)
                .map(|value| PathBuf::from(value).join(rest))
                .unwrap_or_else(|_| PathBuf::from(path)),
            None => env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path)),
        }
    } else {
        PathBuf::from(path)
    }
}
