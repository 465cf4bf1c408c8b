//! Detection of the converter's output file.
//!
//! Converter releases disagree on output naming: some honour the base path,
//! some append their own extension, some change case. The locator evaluates
//! a ranked list of rules and returns the first file that exists.

use std::path::{Path, PathBuf};

/// Suffixes appended to the base name, in probe order.
pub const VARIANT_SUFFIXES: [&str; 7] = [
    ".DSK",
    ".dsk",
    ".EDSK",
    ".edsk",
    ".dsk.DSK",
    ".edsk.EDSK",
    ".DSK.DSK",
];

/// Image format extensions accepted by the directory scan (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 2] = ["dsk", "edsk"];

/// Candidate-generation rules, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateRule {
    /// The path the converter was asked to produce.
    Exact,
    /// Known naming variants of the base name.
    Variant,
    /// Any image-like file in the directory starting with the base name.
    Scan,
}

impl LocateRule {
    /// All rules, highest priority first.
    pub const RANKED: [LocateRule; 3] = [LocateRule::Exact, LocateRule::Variant, LocateRule::Scan];
}

/// Variant candidate paths for `base` inside `dir`, in probe order.
pub fn variant_candidates(dir: &Path, base: &str) -> Vec<PathBuf> {
    VARIANT_SUFFIXES
        .iter()
        .map(|suffix| dir.join(format!("{base}{suffix}")))
        .collect()
}

/// Whether a directory entry name is accepted by the scan rule.
pub fn scan_matches(file_name: &str, base: &str) -> bool {
    if !file_name.starts_with(base) {
        return false;
    }
    let Some((_, ext)) = file_name[base.len()..].rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
}

/// Find the converter output for `base`, given the path it was expected at.
///
/// The exact path wins when present. Otherwise variants are probed, then the
/// expected path's directory is scanned in file name order.
pub fn locate_output(expected: &Path, base: &str) -> Option<PathBuf> {
    let dir = expected.parent().unwrap_or_else(|| Path::new("."));

    for rule in LocateRule::RANKED {
        let found = match rule {
            LocateRule::Exact => expected.is_file().then(|| expected.to_path_buf()),
            LocateRule::Variant => variant_candidates(dir, base)
                .into_iter()
                .find(|p| p.is_file()),
            LocateRule::Scan => scan_dir(dir, base),
        };
        if let Some(path) = found {
            tracing::debug!(rule = ?rule, path = %path.display(), "located converter output");
            return Some(path);
        }
    }

    tracing::debug!(expected = %expected.display(), base, "no converter output found");
    None
}

fn scan_dir(dir: &Path, base: &str) -> Option<PathBuf> {
    let mut names: Vec<(String, PathBuf)> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            scan_matches(&name, base).then(|| (name, entry.path()))
        })
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    names.into_iter().next().map(|(_, path)| path)
}
