use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use config::{ConfigError, Environment, File};

use super::model::Config;
use crate::audit::TimeFormat;
use crate::cli::Cli;

pub fn load(path: &Path) -> Result<Config> {
    let builder = config::Config::builder()
        .add_source(File::from(path.to_path_buf()).required(true))
        .add_source(
            Environment::with_prefix("PROMPTGATE")
                .separator("__")
                .try_parsing(true),
        );

    let raw = builder.build().map_err(to_anyhow)?;
    let config: Config = raw.try_deserialize().map_err(to_anyhow)?;
    config.validate()?;
    // Audit timestamps use this format on every event; reject bad
    // descriptions before the listener binds.
    TimeFormat::parse(config.time_format.as_deref())?;
    Ok(config)
}

pub fn resolve_config_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }

    for candidate in default_config_candidates() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    bail!(
        "no configuration file provided via --config and none found in default locations: {}",
        default_config_candidates()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
}

fn default_config_candidates() -> [PathBuf; 2] {
    [
        PathBuf::from("config.yaml"),
        PathBuf::from("/etc/promptgate/config.yaml"),
    ]
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}
