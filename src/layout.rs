//! Output directory layout for a run.
//!
//! A run owns one output root holding two sibling directories:
//! - screenshots (`test-screenshots/` by default)
//! - reports (`test-reports/` by default), whose HTML links back to the
//!   screenshots through a relative `../<screenshots>/` path
//!
//! Concurrent runs must use distinct roots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::capture::{SCREENSHOT_EXTENSION, generate_run_id};
use crate::config::OutputSettings;
use crate::report::JSON_REPORT_NAME;

pub const DEFAULT_SCREENSHOT_DIR: &str = "test-screenshots";
pub const DEFAULT_REPORT_DIR: &str = "test-reports";

/// Metadata file written into the output root by [`OutputLayout::init`]
pub const RUN_METADATA_FILE: &str = ".run.json";

#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub run_id: String,
    root: PathBuf,
    screenshot_dir_name: String,
    report_dir_name: String,
}

impl OutputLayout {
    /// Layout with the default directory names under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_dirs(root, DEFAULT_SCREENSHOT_DIR, DEFAULT_REPORT_DIR)
    }

    pub fn with_dirs(
        root: impl Into<PathBuf>,
        screenshot_dir_name: impl Into<String>,
        report_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: generate_run_id(),
            root: root.into(),
            screenshot_dir_name: screenshot_dir_name.into(),
            report_dir_name: report_dir_name.into(),
        }
    }

    pub fn from_settings(settings: &OutputSettings) -> Self {
        Self::with_dirs(&settings.root, &settings.screenshot_dir, &settings.report_dir)
    }

    /// Same directory names, different root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(&self.screenshot_dir_name)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(&self.report_dir_name)
    }

    /// Link prefix from a report page to the screenshots
    pub fn screenshots_href(&self) -> String {
        format!("../{}", self.screenshot_dir_name)
    }

    pub fn results_json_path(&self) -> PathBuf {
        self.reports_dir().join(JSON_REPORT_NAME)
    }

    /// Create both directories and record run metadata. Idempotent.
    pub fn init(&self) -> io::Result<()> {
        fs::create_dir_all(self.screenshots_dir())?;
        fs::create_dir_all(self.reports_dir())?;

        let metadata = serde_json::json!({
            "id": self.run_id,
            "created": chrono::Utc::now().to_rfc3339(),
            "host": host_name(),
        });
        let metadata_path = self.root.join(RUN_METADATA_FILE);
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;
        debug!("Output layout ready at {}", self.root.display());
        Ok(())
    }

    /// Remove screenshots left by a previous run. Returns how many were removed.
    pub fn clean_screenshots(&self) -> io::Result<usize> {
        let stale = self.list_screenshots()?;
        for path in &stale {
            fs::remove_file(path)?;
        }
        Ok(stale.len())
    }

    /// All PNG files in the screenshots directory, sorted by name
    pub fn list_screenshots(&self) -> io::Result<Vec<PathBuf>> {
        let dir = self.screenshots_dir();
        let mut captures = Vec::new();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|e| e == SCREENSHOT_EXTENSION) {
                    captures.push(path);
                }
            }
        }
        captures.sort();
        Ok(captures)
    }
}

/// Host name of this machine, if it can be read
pub fn host_name() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dirs() {
        let layout = OutputLayout::new("/tmp/out");
        assert_eq!(layout.screenshots_dir(), PathBuf::from("/tmp/out/test-screenshots"));
        assert_eq!(layout.reports_dir(), PathBuf::from("/tmp/out/test-reports"));
        assert_eq!(layout.screenshots_href(), "../test-screenshots");
        assert!(layout.run_id.starts_with("run_"));
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::with_dirs(dir.path().join("nested/out"), "shots", "reports");
        layout.init().unwrap();
        layout.init().unwrap();

        assert!(layout.screenshots_dir().is_dir());
        assert!(layout.reports_dir().is_dir());
        let raw = fs::read_to_string(layout.root().join(RUN_METADATA_FILE)).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta["id"], layout.run_id.as_str());
    }

    #[test]
    fn test_clean_screenshots_only_removes_png() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.init().unwrap();
        let shots = layout.screenshots_dir();
        fs::write(shots.join("001-a.png"), b"x").unwrap();
        fs::write(shots.join("002-b.png"), b"x").unwrap();
        fs::write(shots.join("notes.txt"), b"keep").unwrap();

        let listed = layout.list_screenshots().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].ends_with("001-a.png"));

        assert_eq!(layout.clean_screenshots().unwrap(), 2);
        assert!(layout.list_screenshots().unwrap().is_empty());
        assert!(shots.join("notes.txt").exists());
    }
}
