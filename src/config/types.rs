use chrono::{DateTime, Local};
use diskforged_tools::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of generated base names.
pub const DEFAULT_BASENAME_PREFIX: &str = "TatungBytes";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub imaging: ImagingConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit path to the reader, used when it is not on PATH
    #[serde(default)]
    pub reader_path: Option<String>,

    /// Explicit path to the converter, used when it is not on PATH
    #[serde(default)]
    pub converter_path: Option<String>,

    /// Locations tried for the converter when it is not on PATH and no
    /// explicit path is set. `~` is expanded.
    #[serde(default = "default_converter_fallbacks")]
    pub converter_fallbacks: Vec<String>,

    /// Search path used instead of the process PATH
    #[serde(default)]
    pub search_path: Option<String>,
}

fn default_converter_fallbacks() -> Vec<String> {
    [
        "~/SugarConvDsk/SugarConvDsk",
        "~/SugarConvDsk/bin/SugarConvDsk",
        "~/.local/bin/SugarConvDsk",
        "~/bin/SugarConvDsk",
        "/usr/local/bin/SugarConvDsk",
        "/opt/SugarConvDsk/SugarConvDsk",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            reader_path: None,
            converter_path: None,
            converter_fallbacks: default_converter_fallbacks(),
            search_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagingConfig {
    #[serde(default)]
    pub drive: u32,

    #[serde(default = "default_tracks")]
    pub tracks: String,

    #[serde(default = "default_revs")]
    pub revs: u32,

    /// Last used base name; a timestamped one is generated when unset
    #[serde(default)]
    pub base_name: Option<String>,

    /// Where captures, images, logs and summaries are written
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_tracks() -> String {
    "c=0-39:h=0".to_string()
}
fn default_revs() -> u32 {
    3
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            drive: 0,
            tracks: default_tracks(),
            revs: default_revs(),
            base_name: None,
            output_dir: None,
        }
    }
}

impl ImagingConfig {
    /// Configured output directory (with `~` expanded), else the desktop,
    /// else the home directory.
    pub fn resolved_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
            return PathBuf::from(expanded);
        }
        dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Configured base name, or a fresh timestamped one.
    pub fn resolved_base_name(&self, now: DateTime<Local>) -> String {
        match self.base_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_base_name(now),
        }
    }
}

/// `TatungBytes_YYYYmmdd_HHMMSS`
pub fn default_base_name(now: DateTime<Local>) -> String {
    format!("{}_{}", DEFAULT_BASENAME_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_read_template")]
    pub read: String,

    #[serde(default = "default_convert_template")]
    pub convert: String,
}

fn default_read_template() -> String {
    r#""{reader}" read --drive={drive} --tracks={tracks} --revs={revs} "{capture}""#.to_string()
}
fn default_convert_template() -> String {
    r#""{converter}" "{capture}" "{outbase}" -o=EDSK"#.to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            read: default_read_template(),
            convert: default_convert_template(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Arguments for the reader's help invocation
    #[serde(default = "default_help_args")]
    pub help_args: Vec<String>,

    /// Arguments for the reader's device info invocation
    #[serde(default = "default_info_args")]
    pub info_args: Vec<String>,
}

fn default_help_args() -> Vec<String> {
    vec!["--help".to_string()]
}
fn default_info_args() -> Vec<String> {
    vec!["info".to_string()]
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            help_args: default_help_args(),
            info_args: default_info_args(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DigestConfig {
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<HashAlgorithm>,
}

fn default_algorithms() -> Vec<HashAlgorithm> {
    HashAlgorithm::DEFAULT_SET.to_vec()
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
        }
    }
}
