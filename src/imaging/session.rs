//! Imaging session record and its persisted summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diskforged_tools::DigestSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version of the summary file layout.
pub const SUMMARY_FORMAT_VERSION: u32 = 1;

/// Everything known about one imaging run.
#[derive(Debug, Clone, Serialize)]
pub struct ImagingSession {
    pub base_name: String,
    pub started_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub capture_path: PathBuf,
    pub output_base: PathBuf,
    pub expected_image_path: PathBuf,
    pub image_path: Option<PathBuf>,
    pub log_path: PathBuf,
    pub read_exit_code: Option<i32>,
    pub convert_exit_code: Option<i32>,
    pub capture_digests: DigestSet,
    pub image_digests: DigestSet,
}

impl ImagingSession {
    /// Lay out the artifact paths for `base_name` inside `output_dir`.
    pub fn new(base_name: &str, output_dir: &Path, started_at: DateTime<Utc>) -> Self {
        Self {
            base_name: base_name.to_string(),
            started_at,
            output_dir: output_dir.to_path_buf(),
            capture_path: output_dir.join(format!("{base_name}.scp")),
            output_base: output_dir.join(base_name),
            expected_image_path: output_dir.join(format!("{base_name}.DSK")),
            image_path: None,
            log_path: output_dir.join(format!("{base_name}.log")),
            read_exit_code: None,
            convert_exit_code: None,
            capture_digests: DigestSet::new(),
            image_digests: DigestSet::new(),
        }
    }

    /// Where the summary of a successful run is written.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.summary.json", self.base_name))
    }

    /// Build the persisted summary. `None` until both stages succeeded and
    /// the image was located.
    pub fn summary(&self, finished_at: DateTime<Utc>) -> Option<SessionSummary> {
        Some(SessionSummary {
            format_version: SUMMARY_FORMAT_VERSION,
            base_name: self.base_name.clone(),
            started_at: self.started_at,
            finished_at,
            capture: self.capture_path.clone(),
            image: self.image_path.clone()?,
            read_exit_code: self.read_exit_code?,
            convert_exit_code: self.convert_exit_code?,
            capture_digests: self.capture_digests.clone(),
            image_digests: self.image_digests.clone(),
        })
    }
}

/// Summary file written beside the image on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub format_version: u32,
    pub base_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub capture: PathBuf,
    pub image: PathBuf,
    pub read_exit_code: i32,
    pub convert_exit_code: i32,
    pub capture_digests: DigestSet,
    pub image_digests: DigestSet,
}

/// Write `summary` as pretty JSON.
pub fn write_summary(path: &Path, summary: &SessionSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write summary file: {:?}", path))?;
    Ok(())
}

/// Read a summary back, e.g. to re-verify an image later.
pub fn read_summary(path: &Path) -> Result<SessionSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read summary file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse summary file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskforged_tools::HashAlgorithm;
    use tempfile::TempDir;

    #[test]
    fn test_session_paths() {
        let session = ImagingSession::new("Test1", Path::new("/out"), Utc::now());
        assert_eq!(session.capture_path, PathBuf::from("/out/Test1.scp"));
        assert_eq!(session.output_base, PathBuf::from("/out/Test1"));
        assert_eq!(session.expected_image_path, PathBuf::from("/out/Test1.DSK"));
        assert_eq!(session.log_path, PathBuf::from("/out/Test1.log"));
        assert_eq!(session.summary_path(), PathBuf::from("/out/Test1.summary.json"));
    }

    #[test]
    fn test_summary_requires_completed_run() {
        let mut session = ImagingSession::new("Test1", Path::new("/out"), Utc::now());
        assert!(session.summary(Utc::now()).is_none());

        session.read_exit_code = Some(0);
        session.convert_exit_code = Some(0);
        assert!(session.summary(Utc::now()).is_none());

        session.image_path = Some(PathBuf::from("/out/Test1.DSK"));
        let summary = session.summary(Utc::now()).unwrap();
        assert_eq!(summary.format_version, SUMMARY_FORMAT_VERSION);
        assert_eq!(summary.image, PathBuf::from("/out/Test1.DSK"));
    }

    #[test]
    fn test_write_and_read_summary() {
        let dir = TempDir::new().unwrap();
        let mut session = ImagingSession::new("Disk", dir.path(), Utc::now());
        session.read_exit_code = Some(0);
        session.convert_exit_code = Some(0);
        session.image_path = Some(dir.path().join("Disk.DSK"));
        session
            .capture_digests
            .insert(HashAlgorithm::Md5, "00".repeat(16));

        let summary = session.summary(Utc::now()).unwrap();
        let path = session.summary_path();
        write_summary(&path, &summary).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"format_version\": 1"));
        assert!(text.contains("\"md5\""));
        assert_eq!(read_summary(&path).unwrap(), summary);
    }
}
