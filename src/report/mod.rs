//! Report rendering: HTML gallery, JSON data dump and text summary.
//!
//! Rendering runs once per run on a [`RunSummary`] snapshot. The three
//! artifacts are written independently; a failure writing one is reported in
//! the [`RenderOutcome`] without stopping the others.

pub mod html;
pub mod json;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregator::RunSummary;
use crate::layout::OutputLayout;

pub const JSON_REPORT_NAME: &str = "test-results.json";
pub const TEXT_REPORT_NAME: &str = "test-summary.txt";
pub const DEFAULT_HTML_REPORT_NAME: &str = "test-report.html";
pub const DEFAULT_REPORT_TITLE: &str = "Test Report";

/// Failure writing a single report artifact
#[derive(Debug, Error)]
pub enum ReportWriteError {
    #[error("failed to write report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportWriteError>;

/// A titled group of tested features, shown in the HTML "features tested" panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Presentation options for a render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    pub html_file_name: String,
    /// Link prefix from the reports directory to the screenshots directory
    pub screenshots_href: String,
    /// Listed in the text summary when set
    pub screenshots_dir: Option<PathBuf>,
    pub generated_at: DateTime<Utc>,
    pub host: Option<String>,
    pub features: Vec<FeatureGroup>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_REPORT_TITLE.to_string(),
            html_file_name: DEFAULT_HTML_REPORT_NAME.to_string(),
            screenshots_href: "../test-screenshots".to_string(),
            screenshots_dir: None,
            generated_at: Utc::now(),
            host: None,
            features: Vec::new(),
        }
    }
}

impl RenderOptions {
    /// Options whose links and paths match an output layout
    pub fn for_layout(layout: &OutputLayout) -> Self {
        Self {
            screenshots_href: layout.screenshots_href(),
            screenshots_dir: Some(layout.screenshots_dir()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_html_file_name(mut self, name: impl Into<String>) -> Self {
        self.html_file_name = name.into();
        self
    }

    pub fn with_screenshots_href(mut self, href: impl Into<String>) -> Self {
        self.screenshots_href = href.into();
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = at;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_features(mut self, features: Vec<FeatureGroup>) -> Self {
        self.features = features;
        self
    }
}

/// Paths of the three written artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub html: PathBuf,
    pub json: PathBuf,
    pub text: PathBuf,
}

impl ReportPaths {
    pub fn in_dir(reports_dir: &Path, html_file_name: &str) -> Self {
        Self {
            html: reports_dir.join(html_file_name),
            json: reports_dir.join(JSON_REPORT_NAME),
            text: reports_dir.join(TEXT_REPORT_NAME),
        }
    }
}

/// Per-artifact results of a render
#[derive(Debug)]
pub struct RenderOutcome {
    pub html: ReportResult<PathBuf>,
    pub json: ReportResult<PathBuf>,
    pub text: ReportResult<PathBuf>,
}

impl RenderOutcome {
    pub fn is_complete(&self) -> bool {
        self.html.is_ok() && self.json.is_ok() && self.text.is_ok()
    }

    pub fn errors(&self) -> Vec<&ReportWriteError> {
        [&self.html, &self.json, &self.text]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
            .collect()
    }

    /// All three paths, or the first error in html/json/text order
    pub fn into_result(self) -> ReportResult<ReportPaths> {
        Ok(ReportPaths {
            html: self.html?,
            json: self.json?,
            text: self.text?,
        })
    }
}

/// Renders a run summary into the report directory
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    options: RenderOptions,
}

impl ReportRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render(&self, summary: &RunSummary, reports_dir: &Path) -> RenderOutcome {
        if let Err(err) = fs::create_dir_all(reports_dir) {
            warn!("Could not create report directory {}: {err}", reports_dir.display());
        }
        let paths = ReportPaths::in_dir(reports_dir, &self.options.html_file_name);

        let html = write_artifact(&paths.html, || Ok(html::render_html(summary, &self.options)));
        let json = write_artifact(&paths.json, || json::render_json(summary));
        let text = write_artifact(&paths.text, || {
            Ok(text::render_text(summary, &self.options, &paths))
        });

        let outcome = RenderOutcome { html, json, text };
        for err in outcome.errors() {
            warn!("Report artifact not written: {err}");
        }
        outcome
    }
}

fn write_artifact<F>(path: &Path, build: F) -> ReportResult<PathBuf>
where
    F: FnOnce() -> ReportResult<String>,
{
    let content = build()?;
    fs::write(path, content).map_err(|source| ReportWriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Report written: {}", path.display());
    Ok(path.to_path_buf())
}
