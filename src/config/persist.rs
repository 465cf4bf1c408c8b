//! Configuration persistence.
//!
//! Saving is explicit: the CLI writes the config back after a successful run
//! or on `save-config`, never from arbitrary call sites.

use super::{Config, ImagingConfig, ToolsConfig};
use anyhow::{Context, Result};
use std::path::Path;

/// Save the entire config to a TOML file, creating parent directories.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).with_context(|| "Failed to serialize config")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    tracing::debug!("Saved config to {:?}", path);
    Ok(())
}

/// Record the parameters of a completed run so the next run starts from them.
pub fn remember_run(config: &mut Config, imaging: &ImagingConfig, tools: &ToolsConfig) {
    config.imaging = imaging.clone();
    config.tools.reader_path = tools.reader_path.clone();
    config.tools.converter_path = tools.converter_path.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.imaging.drive = 2;
        config.imaging.base_name = Some("Disk7".to_string());
        config.tools.reader_path = Some("~/gw/gw".to_string());
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.imaging.drive, 2);
        assert_eq!(loaded.imaging.base_name.as_deref(), Some("Disk7"));
        assert_eq!(loaded.tools.reader_path.as_deref(), Some("~/gw/gw"));
        assert_eq!(loaded.templates.read, config.templates.read);
        assert_eq!(loaded.digest.algorithms, config.digest.algorithms);
    }

    #[test]
    fn test_remember_run() {
        let mut config = Config::default();
        let imaging = ImagingConfig {
            drive: 1,
            base_name: Some("Last".to_string()),
            ..Default::default()
        };
        let tools = ToolsConfig {
            converter_path: Some("/opt/conv".to_string()),
            ..Default::default()
        };
        remember_run(&mut config, &imaging, &tools);
        assert_eq!(config.imaging.drive, 1);
        assert_eq!(config.imaging.base_name.as_deref(), Some("Last"));
        assert_eq!(config.tools.converter_path.as_deref(), Some("/opt/conv"));
    }
}
