pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched when no config path is given, in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["./diskforged.toml", "~/.config/diskforged/config.toml"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from the given path or the default locations, or return
/// defaults. Also returns the path the config should be saved back to.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<(Config, PathBuf)> {
    if let Some(path) = custom_path {
        if path.exists() {
            return Ok((load_config(path)?, path.to_path_buf()));
        }
        tracing::info!("Config file {:?} does not exist yet, using defaults", path);
        return Ok((Config::default(), path.to_path_buf()));
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(shellexpand::tilde(path_str).as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return Ok((load_config(&path)?, path));
        }
    }

    Ok((Config::default(), user_config_path()))
}

/// Per-user config location, where new configs are saved.
pub fn user_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATHS[1]).as_ref())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.imaging.revs == 0 {
        anyhow::bail!("Revolution count cannot be 0");
    }

    if config.imaging.tracks.trim().is_empty() {
        anyhow::bail!("Track range cannot be empty");
    }

    if config.templates.read.trim().is_empty() {
        anyhow::bail!("Read command template cannot be empty");
    }

    if config.templates.convert.trim().is_empty() {
        anyhow::bail!("Convert command template cannot be empty");
    }

    if config.digest.algorithms.is_empty() {
        anyhow::bail!("At least one digest algorithm is required");
    }

    if config.probe.info_args.is_empty() {
        tracing::warn!("Probe info arguments are empty; the reader will be run without arguments");
    }

    Ok(())
}
