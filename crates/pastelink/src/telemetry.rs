//! Logging setup: tracing-subscriber fmt output filtered by `RUST_LOG`,
//! falling back to the configured level.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level {log_level:?}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
