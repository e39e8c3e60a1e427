use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::browser::{DialogPolicy, Viewport, WaitState};
use crate::config::parse_viewport;
use crate::record::LifecycleError;
use crate::report::FeatureGroup;

/// Default time a `first_visible` probe waits for each candidate (ms)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// A declarative scenario suite, loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    /// Report title; defaults to the suite name
    #[serde(default)]
    pub title: Option<String>,

    /// Application under test: a URL, or a path relative to the suite file
    pub app: String,

    /// Viewport preset or `WxH`; the configured default when absent
    #[serde(default)]
    pub viewport: Option<String>,

    #[serde(default)]
    pub dialogs: DialogPolicy,

    /// HTML report file name override
    #[serde(default)]
    pub html_report: Option<String>,

    /// Shown in the "features tested" panel of the HTML report
    #[serde(default)]
    pub features: Vec<FeatureGroup>,

    pub scenarios: Vec<Scenario>,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// One test case: an ordered list of actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub actions: Vec<Action>,
}

/// A candidate affordance probed by [`Action::FirstVisible`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub selector: String,

    /// Human name recorded in the step log, e.g. "Deny button"
    pub label: String,

    /// Run when this candidate is the first one visible
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_probe_label() -> String {
    "probe".to_string()
}

/// A single scenario action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to `url` (the suite app when absent)
    Goto {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        wait_for: Option<String>,
    },

    Reload {
        #[serde(default)]
        wait_for: Option<String>,
    },

    Fill {
        selector: String,
        value: String,
    },

    Click {
        selector: String,
    },

    Select {
        selector: String,
        value: String,
    },

    Check {
        selector: String,
    },

    Hover {
        selector: String,
    },

    WaitFor {
        selector: String,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fixed delay, the configured settle delay when `ms` is absent
    Pause {
        #[serde(default)]
        ms: Option<u64>,
    },

    ExpectVisible {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    ExpectText {
        selector: String,
        contains: String,
    },

    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
        #[serde(default)]
        description: String,
    },

    /// Record a passing checkpoint in the step log
    Step {
        label: String,
        description: String,
    },

    /// Probe candidates in order and act on the first visible one
    FirstVisible {
        candidates: Vec<Candidate>,
        /// Step description when no candidate is visible; absent means failure
        #[serde(default)]
        otherwise: Option<String>,
        #[serde(default)]
        probe_timeout_ms: Option<u64>,
        #[serde(default = "default_probe_label")]
        label: String,
    },

    Log {
        message: String,
    },
}

impl Action {
    /// Short human-readable form for action logs
    pub fn describe(&self) -> String {
        match self {
            Action::Goto { url, .. } => format!("goto {}", url.as_deref().unwrap_or("app")),
            Action::Reload { .. } => "reload".to_string(),
            Action::Fill { selector, .. } => format!("fill {selector}"),
            Action::Click { selector } => format!("click {selector}"),
            Action::Select { selector, value } => format!("select {value} in {selector}"),
            Action::Check { selector } => format!("check {selector}"),
            Action::Hover { selector } => format!("hover {selector}"),
            Action::WaitFor { selector, state, .. } => {
                format!("wait for {selector} {}", state.as_str())
            }
            Action::Pause { ms } => match ms {
                Some(ms) => format!("pause {ms}ms"),
                None => "pause".to_string(),
            },
            Action::ExpectVisible { selector, .. } => format!("expect {selector} visible"),
            Action::ExpectText { selector, contains } => {
                format!("expect {selector} to contain {contains:?}")
            }
            Action::Screenshot { name, .. } => format!("screenshot {name}"),
            Action::Step { label, .. } => format!("step {label}"),
            Action::FirstVisible { label, .. } => format!("first visible ({label})"),
            Action::Log { message } => format!("log: {}", truncate(message, 30)),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl Suite {
    /// Load and validate a suite file. Relative `app` paths resolve against
    /// the file's directory.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| HarnessError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut suite = Self::from_json(&raw)?;
        suite.base_dir = path.parent().map(Path::to_path_buf);
        Ok(suite)
    }

    /// Parse and validate a suite; relative paths resolve against the
    /// working directory.
    pub fn from_json(json: &str) -> HarnessResult<Self> {
        let suite: Suite = serde_json::from_str(json)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Viewport requested by the suite, or `default`
    pub fn viewport_or(&self, default: Viewport) -> HarnessResult<Viewport> {
        match &self.viewport {
            Some(raw) => parse_viewport(raw)
                .ok_or_else(|| HarnessError::Invalid(format!("bad viewport '{raw}'"))),
            None => Ok(default),
        }
    }

    /// Resolve a navigation target. `None` means the suite's app. Values with a
    /// scheme pass through; anything else is a file path turned into a
    /// `file://` URL.
    pub fn resolve_url(&self, target: Option<&str>) -> String {
        let target = target.unwrap_or(&self.app);
        if target.contains("://") || target.starts_with("about:") || target.starts_with("data:") {
            return target.to_string();
        }

        let (path, fragment) = match target.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (target, None),
        };
        let mut full = PathBuf::from(path);
        if full.is_relative() {
            if let Some(base) = &self.base_dir {
                full = base.join(full);
            }
        }
        let full = full
            .canonicalize()
            .or_else(|_| std::path::absolute(&full))
            .unwrap_or(full);

        let mut url = format!("file://{}", full.display());
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::Invalid("suite name is empty".into()));
        }
        if self.app.trim().is_empty() {
            return Err(HarnessError::Invalid("suite app is empty".into()));
        }
        if self.scenarios.is_empty() {
            return Err(HarnessError::Invalid(format!("suite '{}' has no scenarios", self.name)));
        }
        if let Some(raw) = &self.viewport {
            if parse_viewport(raw).is_none() {
                return Err(HarnessError::Invalid(format!("bad viewport '{raw}'")));
            }
        }
        for scenario in &self.scenarios {
            if scenario.name.trim().is_empty() {
                return Err(HarnessError::Invalid("scenario name is empty".into()));
            }
            validate_actions(&scenario.name, &scenario.actions)?;
        }
        Ok(())
    }
}

fn validate_actions(scenario: &str, actions: &[Action]) -> HarnessResult<()> {
    for action in actions {
        match action {
            Action::Screenshot { name, .. } if name.trim().is_empty() => {
                return Err(HarnessError::Invalid(format!(
                    "scenario '{scenario}': screenshot name is empty"
                )));
            }
            Action::FirstVisible { candidates, .. } => {
                if candidates.is_empty() {
                    return Err(HarnessError::Invalid(format!(
                        "scenario '{scenario}': first_visible needs at least one candidate"
                    )));
                }
                for candidate in candidates {
                    validate_actions(scenario, &candidate.actions)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for suite loading and runs
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("cannot read suite {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid suite JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid suite: {0}")]
    Invalid(String),

    /// The aggregator rejected a lifecycle call; the run's bookkeeping is broken
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"{
        "name": "job-board",
        "app": "https://example.test/",
        "scenarios": [{
            "name": "Deal Deletion Flow",
            "actions": [
                { "action": "goto", "wait_for": "#board" },
                { "action": "step", "label": "1", "description": "Board loaded" },
                { "action": "wait_for", "selector": "#deal", "state": "detached", "timeout_ms": 500 },
                { "action": "screenshot", "name": "deal-deleted", "full_page": true },
                { "action": "first_visible",
                  "candidates": [{ "selector": ".deny-btn", "label": "Deny",
                                   "actions": [{ "action": "click", "selector": ".deny-btn" }] }],
                  "otherwise": "No deny affordance" }
            ]
        }]
    }"##;

    #[test]
    fn test_parse_actions() {
        let suite = Suite::from_json(MINIMAL).unwrap();
        assert_eq!(suite.title(), "job-board");
        assert_eq!(suite.dialogs, DialogPolicy::Accept);

        let actions = &suite.scenarios[0].actions;
        assert!(matches!(&actions[0], Action::Goto { url: None, wait_for: Some(w) } if w == "#board"));
        assert!(matches!(
            &actions[2],
            Action::WaitFor { state: WaitState::Detached, timeout_ms: Some(500), .. }
        ));
        assert!(matches!(&actions[3], Action::Screenshot { full_page: true, description, .. } if description.is_empty()));
        match &actions[4] {
            Action::FirstVisible { candidates, label, probe_timeout_ms, .. } => {
                assert_eq!(candidates[0].label, "Deny");
                assert_eq!(label, "probe");
                assert_eq!(*probe_timeout_ms, None);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_validation() {
        let no_scenarios = r#"{ "name": "s", "app": "index.html", "scenarios": [] }"#;
        assert!(matches!(Suite::from_json(no_scenarios), Err(HarnessError::Invalid(_))));

        let blank_shot = r#"{ "name": "s", "app": "index.html", "scenarios": [
            { "name": "a", "actions": [{ "action": "screenshot", "name": " " }] } ] }"#;
        assert!(matches!(Suite::from_json(blank_shot), Err(HarnessError::Invalid(_))));

        let bad_viewport = r#"{ "name": "s", "app": "x", "viewport": "huge",
            "scenarios": [{ "name": "a", "actions": [] }] }"#;
        assert!(matches!(Suite::from_json(bad_viewport), Err(HarnessError::Invalid(_))));

        let unknown_action = r#"{ "name": "s", "app": "x",
            "scenarios": [{ "name": "a", "actions": [{ "action": "teleport" }] }] }"#;
        assert!(matches!(Suite::from_json(unknown_action), Err(HarnessError::Parse(_))));
    }

    #[test]
    fn test_resolve_url() {
        let dir = tempfile::tempdir().unwrap();
        let suite_path = dir.path().join("suite.json");
        std::fs::write(
            &suite_path,
            r#"{ "name": "s", "app": "app/index.html", "viewport": "mobile",
                 "scenarios": [{ "name": "a", "actions": [] }] }"#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/index.html"), "<html></html>").unwrap();

        let suite = Suite::load(&suite_path).unwrap();
        let url = suite.resolve_url(None);
        assert!(url.starts_with("file:///"), "{url}");
        assert!(url.ends_with("app/index.html"), "{url}");
        assert!(suite.resolve_url(Some("app/index.html#deals")).ends_with("index.html#deals"));
        assert_eq!(suite.resolve_url(Some("http://localhost:3000")), "http://localhost:3000");
        assert_eq!(
            suite.viewport_or(Viewport::new(1, 1)).unwrap(),
            Viewport::new(390, 844)
        );
    }

    #[test]
    fn test_describe() {
        let click = Action::Click { selector: "#submit".into() };
        assert_eq!(click.describe(), "click #submit");
        let log = Action::Log { message: "x".repeat(40) };
        assert_eq!(log.describe(), format!("log: {}", "x".repeat(30)));
    }

    #[test]
    fn test_missing_suite_file() {
        let err = Suite::load(Path::new("/nonexistent/suite.json")).unwrap_err();
        assert!(matches!(err, HarnessError::Read { .. }));
    }
}
