//! External tool resolution.
//!
//! The [`ToolResolver`] locates the flux reader and the image converter. A
//! resolution is recomputed on every call; the user may edit an override path
//! between runs, so nothing is cached.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Executable name of the flux reader.
pub const READER_DEFAULT_NAME: &str = "gw";

/// Executable name of the image converter.
pub const CONVERTER_DEFAULT_NAME: &str = "SugarConvDsk";

/// The two tools of the imaging toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Reader,
    Converter,
}

impl ToolKind {
    /// Name searched for on the executable search path.
    pub fn executable_name(&self) -> &'static str {
        match self {
            ToolKind::Reader => READER_DEFAULT_NAME,
            ToolKind::Converter => CONVERTER_DEFAULT_NAME,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable_name())
    }
}

/// How a tool was (or was not) found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    SearchPath,
    Fallback,
    Override,
    OverrideNotExecutable,
    NotFound,
}

/// Outcome of resolving one tool, including the exact message shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTool {
    /// Tool name.
    pub name: String,
    /// Resolved executable, if any.
    pub path: Option<PathBuf>,
    /// Where the path came from.
    pub source: ResolutionSource,
    /// Rejected override candidate, when the override was not executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<PathBuf>,
    /// Human-readable resolution message.
    pub message: String,
}

impl ResolvedTool {
    fn found(kind: ToolKind, path: PathBuf, source: ResolutionSource) -> Self {
        let how = match source {
            ResolutionSource::SearchPath => "found on PATH",
            ResolutionSource::Fallback => "found via fallback",
            _ => "found via override",
        };
        Self {
            name: kind.executable_name().to_string(),
            message: format!("{how}: {}", path.display()),
            path: Some(path),
            source,
            rejected: None,
        }
    }

    fn failed(kind: ToolKind, err: &Error) -> Self {
        let (source, rejected) = match err {
            Error::OverrideNotExecutable { path, .. } => {
                (ResolutionSource::OverrideNotExecutable, Some(path.clone()))
            }
            _ => (ResolutionSource::NotFound, None),
        };
        Self {
            name: kind.executable_name().to_string(),
            path: None,
            source,
            rejected,
            message: err.to_string(),
        }
    }

    /// Whether an executable was found.
    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }

    /// Convert into the resolved path or the matching resolution error.
    pub fn require(&self) -> Result<PathBuf> {
        match (&self.path, &self.rejected) {
            (Some(path), _) => Ok(path.clone()),
            (None, Some(rejected)) => Err(Error::override_not_executable(
                self.name.clone(),
                rejected.clone(),
            )),
            (None, None) => Err(Error::tool_not_found(self.name.clone())),
        }
    }
}

/// Locates tool executables.
///
/// # Example
///
/// ```no_run
/// use diskforged_tools::tools::{ToolKind, ToolResolver};
///
/// let resolver = ToolResolver::new(vec!["~/SugarConvDsk/SugarConvDsk".into()]);
/// let converter = resolver.resolve(ToolKind::Converter, None);
/// println!("{}", converter.message);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    search_path: Option<OsString>,
    converter_fallbacks: Vec<String>,
}

impl ToolResolver {
    /// Resolver using the process `PATH` and the given converter fallback list.
    pub fn new(converter_fallbacks: Vec<String>) -> Self {
        Self {
            search_path: None,
            converter_fallbacks,
        }
    }

    /// Search this path list instead of the process `PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Resolve `kind`, optionally with a user-supplied override path.
    ///
    /// Order: search path, then (converter only, no override) the fallback
    /// list, then the override. An empty override counts as no override.
    pub fn resolve(&self, kind: ToolKind, override_path: Option<&str>) -> ResolvedTool {
        let name = kind.executable_name();
        let override_path = override_path.map(str::trim).filter(|p| !p.is_empty());

        if let Some(path) = self.search(name) {
            tracing::debug!(tool = name, path = %path.display(), "resolved on search path");
            return ResolvedTool::found(kind, path, ResolutionSource::SearchPath);
        }

        if kind == ToolKind::Converter && override_path.is_none() {
            for candidate in &self.converter_fallbacks {
                let path = with_exe_suffix(expand_home(candidate));
                if is_executable(&path) {
                    tracing::debug!(tool = name, path = %path.display(), "resolved via fallback");
                    return ResolvedTool::found(kind, path, ResolutionSource::Fallback);
                }
                tracing::trace!(tool = name, candidate = %path.display(), "fallback rejected");
            }
        }

        if let Some(raw) = override_path {
            let path = with_exe_suffix(expand_home(raw));
            if is_executable(&path) {
                let path = std::fs::canonicalize(&path).unwrap_or(path);
                tracing::debug!(tool = name, path = %path.display(), "resolved via override");
                return ResolvedTool::found(kind, path, ResolutionSource::Override);
            }
            let err = Error::override_not_executable(name, path);
            tracing::warn!(tool = name, "{err}");
            return ResolvedTool::failed(kind, &err);
        }

        let err = Error::tool_not_found(name);
        tracing::warn!(tool = name, "{err}");
        ResolvedTool::failed(kind, &err)
    }

    fn search(&self, name: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(name, Some(paths), cwd).ok()
            }
            None => which::which(name).ok(),
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Prefer `<path><EXE_SUFFIX>` when the platform has a suffix and that sibling exists.
fn with_exe_suffix(path: PathBuf) -> PathBuf {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || path.to_string_lossy().ends_with(suffix) {
        return path;
    }
    let mut suffixed = path.clone().into_os_string();
    suffixed.push(suffix);
    let suffixed = PathBuf::from(suffixed);
    if suffixed.exists() {
        suffixed
    } else {
        path
    }
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn empty_search_path() -> (TempDir, OsString) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().as_os_str().to_owned();
        (dir, path)
    }

    #[test]
    fn test_search_path_wins_over_override_and_fallback() {
        let bin = TempDir::new().unwrap();
        let on_path = write_tool(bin.path(), CONVERTER_DEFAULT_NAME, 0o755);
        let other = TempDir::new().unwrap();
        let fallback = write_tool(other.path(), "fallback", 0o755);
        let overridden = write_tool(other.path(), "override", 0o755);

        let resolver = ToolResolver::new(vec![fallback.display().to_string()])
            .with_search_path(bin.path().as_os_str());

        let resolved = resolver.resolve(ToolKind::Converter, Some(overridden.to_str().unwrap()));
        assert_eq!(resolved.source, ResolutionSource::SearchPath);
        assert_eq!(
            std::fs::canonicalize(resolved.path.unwrap()).unwrap(),
            std::fs::canonicalize(on_path).unwrap()
        );
        assert!(resolved.message.starts_with("found on PATH: "));
    }

    #[test]
    fn test_fallback_list_walked_in_order() {
        let (_empty, search) = empty_search_path();
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let not_exec = write_tool(dir.path(), "not_exec", 0o644);
        let first_good = write_tool(dir.path(), "first", 0o755);
        let second_good = write_tool(dir.path(), "second", 0o755);

        let resolver = ToolResolver::new(vec![
            missing.display().to_string(),
            not_exec.display().to_string(),
            first_good.display().to_string(),
            second_good.display().to_string(),
        ])
        .with_search_path(search);

        let resolved = resolver.resolve(ToolKind::Converter, None);
        assert_eq!(resolved.source, ResolutionSource::Fallback);
        assert_eq!(resolved.path.as_deref(), Some(first_good.as_path()));
        assert_eq!(
            resolved.message,
            format!("found via fallback: {}", first_good.display())
        );
    }

    #[test]
    fn test_fallback_exhausted_is_not_found() {
        let (_empty, search) = empty_search_path();
        let resolver =
            ToolResolver::new(vec!["/nonexistent/SugarConvDsk".into()]).with_search_path(search);
        let resolved = resolver.resolve(ToolKind::Converter, None);
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.source, ResolutionSource::NotFound);
        assert_eq!(resolved.message, "'SugarConvDsk' not found; provide a path");
        assert!(matches!(resolved.require(), Err(Error::ToolNotFound { .. })));
    }

    #[test]
    fn test_empty_override_still_uses_fallbacks() {
        let (_empty, search) = empty_search_path();
        let dir = TempDir::new().unwrap();
        let good = write_tool(dir.path(), "conv", 0o755);
        let resolver =
            ToolResolver::new(vec![good.display().to_string()]).with_search_path(search);
        let resolved = resolver.resolve(ToolKind::Converter, Some("   "));
        assert_eq!(resolved.source, ResolutionSource::Fallback);
    }

    #[test]
    fn test_override_skips_fallbacks() {
        let (_empty, search) = empty_search_path();
        let dir = TempDir::new().unwrap();
        let fallback = write_tool(dir.path(), "fallback", 0o755);
        let overridden = write_tool(dir.path(), "override", 0o755);
        let resolver =
            ToolResolver::new(vec![fallback.display().to_string()]).with_search_path(search);

        let resolved = resolver.resolve(ToolKind::Converter, Some(overridden.to_str().unwrap()));
        assert_eq!(resolved.source, ResolutionSource::Override);
        assert_eq!(
            resolved.path.unwrap(),
            std::fs::canonicalize(&overridden).unwrap()
        );
    }

    #[test]
    fn test_override_not_executable_names_candidate() {
        let (_empty, search) = empty_search_path();
        let dir = TempDir::new().unwrap();
        let plain = write_tool(dir.path(), "gw", 0o644);
        let resolver = ToolResolver::new(Vec::new()).with_search_path(search);

        let resolved = resolver.resolve(ToolKind::Reader, Some(plain.to_str().unwrap()));
        assert_eq!(resolved.source, ResolutionSource::OverrideNotExecutable);
        assert!(resolved.message.contains(plain.to_str().unwrap()));
        match resolved.require() {
            Err(Error::OverrideNotExecutable { tool, path }) => {
                assert_eq!(tool, "gw");
                assert_eq!(path, plain);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_reader_ignores_converter_fallbacks() {
        let (_empty, search) = empty_search_path();
        let dir = TempDir::new().unwrap();
        let good = write_tool(dir.path(), "gw", 0o755);
        let resolver =
            ToolResolver::new(vec![good.display().to_string()]).with_search_path(search);
        let resolved = resolver.resolve(ToolKind::Reader, None);
        assert_eq!(resolved.source, ResolutionSource::NotFound);
        assert_eq!(resolved.message, "'gw' not found; provide a path");
    }

    #[test]
    fn test_is_executable() {
        let dir = TempDir::new().unwrap();
        assert!(is_executable(&write_tool(dir.path(), "a", 0o755)));
        assert!(!is_executable(&write_tool(dir.path(), "b", 0o600)));
        assert!(!is_executable(dir.path()));
        assert!(!is_executable(&dir.path().join("nope")));
    }
}
