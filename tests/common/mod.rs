//! Shared test harness for integration tests.
//!
//! Provides [`FakeToolchain`], a temporary directory holding shell-script
//! stand-ins for the flux reader and the image converter, plus an output
//! directory and a [`Config`] wired to both.

#![allow(dead_code)]

use diskforged::config::Config;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reader body for a successful read: write a small capture.
pub const READ_OK: &str = r#"printf 'SCP\000FLUXDATA' > "$last"; exit 0"#;

/// Converter body writing the expected `<outbase>.DSK`.
pub const CONVERT_OK: &str = r#"cp "$1" "$2.DSK"; echo "Converted $1"; exit 0"#;

/// Behaviour of the fake reader for each invocation.
pub struct ReaderScript {
    pub info: &'static str,
    pub read: &'static str,
}

impl Default for ReaderScript {
    fn default() -> Self {
        Self {
            info: r#"echo "Host Tools: 1.0"; exit 0"#,
            read: READ_OK,
        }
    }
}

/// Temporary toolchain: `bin/gw`, `bin/SugarConvDsk` and `out/`.
pub struct FakeToolchain {
    pub dir: TempDir,
}

impl FakeToolchain {
    pub fn new(reader: ReaderScript, convert: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();

        let gw = format!(
            r#"#!/bin/sh
case "$1" in
  --help)
    echo "Usage: gw [--help] <command> [<args>]"
    exit 0
    ;;
  info)
    {info}
    ;;
  read)
    for last; do :; done
    echo "Reading c=0:h=0 revs=3"
    echo "Reading c=1:h=0 revs=3" >&2
    {read}
    ;;
esac
exit 2
"#,
            info = reader.info,
            read = reader.read,
        );
        let toolchain = Self { dir };
        toolchain.write_script("gw", &gw);
        toolchain.write_script("SugarConvDsk", &format!("#!/bin/sh\n{convert}\n"));
        toolchain
    }

    /// Reader and converter that both succeed.
    pub fn working() -> Self {
        Self::new(ReaderScript::default(), CONVERT_OK)
    }

    pub fn write_script(&self, name: &str, content: &str) -> PathBuf {
        let path = self.bin_dir().join(name);
        fs::write(&path, content).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn out_file(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    /// Config that only sees this toolchain and writes into `out/`.
    pub fn config(&self, base_name: &str) -> Config {
        let mut config = Config::default();
        config.tools.search_path = Some(self.bin_dir().display().to_string());
        config.tools.converter_fallbacks.clear();
        config.imaging.base_name = Some(base_name.to_string());
        config.imaging.output_dir = Some(self.out_dir());
        config
    }

    /// Write `config` as TOML for CLI tests.
    pub fn write_config(&self, config: &Config) -> PathBuf {
        let path = self.dir.path().join("diskforged.toml");
        diskforged::config::persist::save_config(&path, config).unwrap();
        path
    }
}

pub fn read_to_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e))
}
