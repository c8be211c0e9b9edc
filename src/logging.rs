use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

/// Diagnostic logging only; audit events go to their own sink.
pub fn init_logger(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("promptgate=info,warn"));

    let builder = fmt::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Text => builder.compact().try_init(),
    }
    .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
