//! Drives a [`BrowserDriver`] through a suite, one test case per scenario.
//!
//! Scenario failures never abort the suite: the error becomes a failing step
//! and a failed case, a best-effort `test-failure` screenshot is taken, and
//! the next scenario starts on a fresh page. Only aggregator misuse stops a
//! run.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{Action, DEFAULT_PROBE_TIMEOUT_MS, HarnessResult, Scenario, Suite};
use crate::aggregator::CaseHandle;
use crate::browser::{BrowserDriver, BrowserError, PageOptions, Viewport, WaitState};
use crate::capture::{CaptureError, ScreenshotRecorder};
use crate::config::BrowserSettings;
use crate::record::{CaseStatus, LifecycleError, StepOutcome};

/// Name of the screenshot taken when a scenario fails
pub const FAILURE_SCREENSHOT_NAME: &str = "test-failure";

/// Reason recorded for a case interrupted by cancellation
pub const CANCELLED_MESSAGE: &str = "run cancelled";

/// Why a scenario failed
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{CANCELLED_MESSAGE}")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub viewport: Viewport,
    pub action_timeout_ms: u64,
    /// Default `pause` duration
    pub settle_delay_ms: u64,
    pub capture_on_failure: bool,
}

impl RunnerSettings {
    pub fn from_browser_settings(settings: &BrowserSettings) -> Self {
        Self {
            viewport: settings.viewport,
            action_timeout_ms: settings.action_timeout_ms,
            settle_delay_ms: settings.settle_delay_ms,
            capture_on_failure: true,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_browser_settings(&BrowserSettings::defaults())
    }
}

/// Counts for one suite run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteOutcome {
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios not started because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
}

struct ActionFailure {
    error: ScenarioError,
    /// Label of the next `step` checkpoint after the failing action
    pending_step: Option<String>,
}

pub struct SuiteRunner<'a, D: BrowserDriver + ?Sized> {
    driver: &'a mut D,
    recorder: &'a ScreenshotRecorder,
    settings: RunnerSettings,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, D: BrowserDriver + ?Sized> SuiteRunner<'a, D> {
    pub fn new(driver: &'a mut D, recorder: &'a ScreenshotRecorder, settings: RunnerSettings) -> Self {
        Self {
            driver,
            recorder,
            settings,
            cancel: None,
        }
    }

    /// Stop before the next action once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn run_suite(&mut self, suite: &Suite) -> HarnessResult<SuiteOutcome> {
        let page = PageOptions {
            viewport: suite.viewport_or(self.settings.viewport)?,
            dialogs: suite.dialogs,
            action_timeout_ms: self.settings.action_timeout_ms,
        };
        info!(
            suite = %suite.name,
            scenarios = suite.scenarios.len(),
            viewport = %page.viewport,
            "Starting suite"
        );

        let mut outcome = SuiteOutcome::default();
        for (idx, scenario) in suite.scenarios.iter().enumerate() {
            if self.is_cancelled() {
                outcome.cancelled = true;
                outcome.skipped = suite.scenarios.len() - idx;
                warn!("Run cancelled, skipping {} scenario(s)", outcome.skipped);
                break;
            }
            outcome.executed += 1;
            match self.run_scenario(suite, scenario, &page)? {
                CaseStatus::Pass => outcome.passed += 1,
                _ => outcome.failed += 1,
            }
        }
        if self.is_cancelled() {
            outcome.cancelled = true;
        }

        info!(
            passed = outcome.passed,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Suite finished"
        );
        Ok(outcome)
    }

    /// Run one scenario as one test case and hand it to the aggregator
    pub fn run_scenario(
        &mut self,
        suite: &Suite,
        scenario: &Scenario,
        page: &PageOptions,
    ) -> Result<CaseStatus, LifecycleError> {
        let aggregator = Arc::clone(self.recorder.aggregator());
        let mut case = aggregator.begin_case(&scenario.name);
        info!("Scenario: {}", scenario.name);

        let result = match self.driver.open_page(page) {
            Ok(()) => self.execute_all(suite, &scenario.actions, &mut case),
            Err(err) => Err(ActionFailure {
                error: err.into(),
                pending_step: next_step_label(&scenario.actions),
            }),
        };

        match result {
            Ok(()) => case.pass()?,
            Err(failure) => self.record_failure(&mut case, failure)?,
        }

        if let Err(err) = self.driver.close_page() {
            warn!("Could not close page after '{}': {err}", scenario.name);
        }
        aggregator.complete_case(&mut case)?;
        Ok(case.status())
    }

    fn record_failure(
        &mut self,
        case: &mut CaseHandle<'_>,
        failure: ActionFailure,
    ) -> Result<(), LifecycleError> {
        // An interrupt can also surface as a dead bridge
        let cancelled = matches!(failure.error, ScenarioError::Cancelled) || self.is_cancelled();
        let message = if cancelled {
            CANCELLED_MESSAGE.to_string()
        } else {
            failure.error.to_string()
        };
        if cancelled && !matches!(failure.error, ScenarioError::Cancelled) {
            debug!(case = %case.name(), "Error after cancellation: {}", failure.error);
        }
        warn!(case = %case.name(), "Scenario failed: {message}");

        let label = failure.pending_step.unwrap_or_else(|| "error".to_string());
        case.record_step(label, message.clone(), StepOutcome::Fail)?;

        if self.settings.capture_on_failure && !cancelled {
            let description = format!("Test failure: {message}");
            if let Err(err) =
                self.recorder
                    .capture(&mut *self.driver, FAILURE_SCREENSHOT_NAME, true, &description)
            {
                warn!("Failure screenshot not captured: {err}");
            }
        }
        case.fail(message)
    }

    fn execute_all(
        &mut self,
        suite: &Suite,
        actions: &[Action],
        case: &mut CaseHandle<'_>,
    ) -> Result<(), ActionFailure> {
        for (idx, action) in actions.iter().enumerate() {
            let outcome = if self.is_cancelled() {
                Err(ScenarioError::Cancelled.into())
            } else {
                debug!(case = %case.name(), "{}", action.describe());
                self.execute(suite, action, case)
            };

            if let Err(mut failure) = outcome {
                if failure.pending_step.is_none() {
                    failure.pending_step = next_step_label(&actions[idx + 1..]);
                }
                return Err(failure);
            }
        }
        Ok(())
    }

    fn execute(
        &mut self,
        suite: &Suite,
        action: &Action,
        case: &mut CaseHandle<'_>,
    ) -> Result<(), ActionFailure> {
        let driver = &mut *self.driver;
        match action {
            Action::Goto { url, wait_for } => {
                let target = suite.resolve_url(url.as_deref());
                driver.goto(&target)?;
                if let Some(selector) = wait_for {
                    driver.wait_for(selector, WaitState::Visible, None)?;
                }
            }
            Action::Reload { wait_for } => {
                driver.reload()?;
                if let Some(selector) = wait_for {
                    driver.wait_for(selector, WaitState::Visible, None)?;
                }
            }
            Action::Fill { selector, value } => driver.fill(selector, value)?,
            Action::Click { selector } => driver.click(selector)?,
            Action::Select { selector, value } => driver.select_option(selector, value)?,
            Action::Check { selector } => driver.check(selector)?,
            Action::Hover { selector } => driver.hover(selector)?,
            Action::WaitFor {
                selector,
                state,
                timeout_ms,
            } => driver.wait_for(selector, *state, *timeout_ms)?,
            Action::Pause { ms } => {
                let ms = ms.unwrap_or(self.settings.settle_delay_ms);
                driver.pause(Duration::from_millis(ms))?;
            }
            Action::ExpectVisible {
                selector,
                timeout_ms,
            } => {
                let timeout = timeout_ms.unwrap_or(self.settings.action_timeout_ms);
                if !driver.is_visible(selector, timeout)? {
                    return Err(BrowserError::Assertion(format!("{selector} is not visible")).into());
                }
            }
            Action::ExpectText { selector, contains } => driver.expect_text(selector, contains)?,
            Action::Screenshot {
                name,
                full_page,
                description,
            } => {
                self.recorder.capture(driver, name, *full_page, description)?;
            }
            Action::Step { label, description } => {
                info!("Step {label}: {description}");
                case.record_step(label.clone(), description.clone(), StepOutcome::Pass)?;
            }
            Action::FirstVisible {
                candidates,
                otherwise,
                probe_timeout_ms,
                label,
            } => {
                let timeout = probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS);
                let mut found = None;
                for candidate in candidates {
                    if driver.is_visible(&candidate.selector, timeout)? {
                        found = Some(candidate);
                        break;
                    }
                }
                match (found, otherwise) {
                    (Some(candidate), _) => {
                        let description =
                            format!("{} found ({})", candidate.label, candidate.selector);
                        info!("{label}: {description}");
                        case.record_step(label.clone(), description, StepOutcome::Pass)?;
                        self.execute_all(suite, &candidate.actions, case)?;
                    }
                    (None, Some(otherwise)) => {
                        info!("{label}: {otherwise}");
                        case.record_step(label.clone(), otherwise.clone(), StepOutcome::Pass)?;
                    }
                    (None, None) => {
                        let tried: Vec<&str> =
                            candidates.iter().map(|c| c.label.as_str()).collect();
                        return Err(BrowserError::Assertion(format!(
                            "none of {} is visible",
                            tried.join(", ")
                        ))
                        .into());
                    }
                }
            }
            Action::Log { message } => info!("[{}] {message}", case.name()),
        }
        Ok(())
    }
}

impl From<ScenarioError> for ActionFailure {
    fn from(error: ScenarioError) -> Self {
        Self {
            error,
            pending_step: None,
        }
    }
}

impl From<BrowserError> for ActionFailure {
    fn from(err: BrowserError) -> Self {
        ScenarioError::from(err).into()
    }
}

impl From<CaptureError> for ActionFailure {
    fn from(err: CaptureError) -> Self {
        ScenarioError::from(err).into()
    }
}

impl From<LifecycleError> for ActionFailure {
    fn from(err: LifecycleError) -> Self {
        ScenarioError::from(err).into()
    }
}

fn next_step_label(actions: &[Action]) -> Option<String> {
    actions.iter().find_map(|action| match action {
        Action::Step { label, .. } => Some(label.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RunAggregator;
    use crate::browser::{BrowserResult, MockBrowser};
    use crate::capture::{CaptureBackend, CaptureResult, CapturedImage};
    use pretty_assertions::assert_eq;

    fn suite(json_scenarios: &str) -> Suite {
        Suite::from_json(&format!(
            r#"{{ "name": "job-board", "app": "https://jobs.test/", "scenarios": {json_scenarios} }}"#
        ))
        .unwrap()
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            settle_delay_ms: 0,
            ..RunnerSettings::default()
        }
    }

    #[test]
    fn test_two_step_pass_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new();
        let suite = suite(
            r##"[{ "name": "A", "actions": [
                { "action": "goto", "wait_for": "#board" },
                { "action": "step", "label": "1", "description": "Board loaded" },
                { "action": "screenshot", "name": "initial-load", "full_page": true, "description": "Initial state" },
                { "action": "click", "selector": "#submit" },
                { "action": "step", "label": "2", "description": "Submitted" }
            ] }]"##,
        );

        let outcome = SuiteRunner::new(&mut browser, &recorder, settings())
            .run_suite(&suite)
            .unwrap();
        assert_eq!(outcome, SuiteOutcome { executed: 1, passed: 1, ..Default::default() });

        let summary = run.snapshot();
        assert_eq!((summary.total_tests, summary.passed_tests, summary.failed_tests), (1, 1, 0));
        let labels: Vec<&str> = summary.test_cases[0].steps().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2"]);
        assert_eq!(summary.screenshots[0].filename, "001-initial-load.png");
        assert!(browser.calls().contains(&"goto https://jobs.test/".to_string()));
        assert!(!browser.is_page_open());
    }

    #[test]
    fn test_failure_after_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new().fail_on("#demand-submit", "element is disabled");
        let suite = suite(
            r##"[
              { "name": "Workflow", "actions": [
                { "action": "step", "label": "1.1", "description": "Initial load verified" },
                { "action": "click", "selector": "#demand-submit" },
                { "action": "step", "label": "1.2", "description": "Demand submitted" }
              ] },
              { "name": "Next", "actions": [
                { "action": "step", "label": "1", "description": "Still runs" }
              ] }
            ]"##,
        );

        let outcome = SuiteRunner::new(&mut browser, &recorder, settings())
            .run_suite(&suite)
            .unwrap();
        assert_eq!((outcome.passed, outcome.failed), (1, 1));

        let summary = run.snapshot();
        let failed = &summary.test_cases[0];
        assert_eq!(failed.status(), CaseStatus::Fail);
        assert_eq!(failed.steps().len(), 2);
        assert_eq!(failed.steps()[0].outcome, StepOutcome::Pass);
        assert_eq!(failed.steps()[1].label, "1.2");
        assert_eq!(failed.steps()[1].outcome, StepOutcome::Fail);
        assert_eq!(failed.error(), Some("click #demand-submit failed: element is disabled"));

        assert_eq!(summary.screenshots.len(), 1);
        let shot = &summary.screenshots[0];
        assert_eq!(shot.name, FAILURE_SCREENSHOT_NAME);
        assert!(shot.full_page);
        assert!(shot.description.starts_with("Test failure: "));
        assert_eq!(summary.total_tests, summary.passed_tests + summary.failed_tests);
    }

    #[test]
    fn test_failure_without_pending_step_is_labeled_error() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new().hide("#toast").fail_captures();
        let suite = suite(
            r##"[{ "name": "Toast", "actions": [
                { "action": "expect_visible", "selector": "#toast", "timeout_ms": 10 }
            ] }]"##,
        );

        SuiteRunner::new(&mut browser, &recorder, settings())
            .run_suite(&suite)
            .unwrap();
        let summary = run.snapshot();
        let step = &summary.test_cases[0].steps()[0];
        assert_eq!(step.label, "error");
        assert_eq!(step.description, "assertion failed: #toast is not visible");
        // The failure screenshot could not be taken; the case is still recorded
        assert!(summary.screenshots.is_empty());
        assert_eq!(summary.failed_tests, 1);
    }

    #[test]
    fn test_first_visible_records_the_affordance_found() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new().hide(".deny-btn");
        let suite = suite(
            r##"[
              { "name": "Contractor Denial", "actions": [
                { "action": "first_visible", "label": "3.1",
                  "candidates": [
                    { "selector": ".deny-btn", "label": "Deny button" },
                    { "selector": ".cancel-btn", "label": "Cancel button",
                      "actions": [{ "action": "click", "selector": ".cancel-btn" }] }
                  ] }
              ] },
              { "name": "No Affordance", "actions": [
                { "action": "first_visible", "label": "4.1",
                  "candidates": [{ "selector": ".deny-btn", "label": "Deny button" }],
                  "otherwise": "No deny option shown" }
              ] },
              { "name": "Required Affordance", "actions": [
                { "action": "first_visible",
                  "candidates": [{ "selector": ".deny-btn", "label": "Deny button" }] }
              ] }
            ]"##,
        );

        let outcome = SuiteRunner::new(&mut browser, &recorder, settings())
            .run_suite(&suite)
            .unwrap();
        assert_eq!((outcome.passed, outcome.failed), (2, 1));

        let summary = run.snapshot();
        assert_eq!(
            summary.test_cases[0].steps()[0].description,
            "Cancel button found (.cancel-btn)"
        );
        assert!(browser.calls().contains(&"click .cancel-btn".to_string()));
        assert_eq!(summary.test_cases[1].steps()[0].description, "No deny option shown");
        assert_eq!(
            summary.test_cases[2].error(),
            Some("assertion failed: none of Deny button is visible")
        );
    }

    #[test]
    fn test_cancelled_run_skips_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new();
        let suite = suite(
            r#"[{ "name": "A", "actions": [] }, { "name": "B", "actions": [] }]"#,
        );
        let flag = Arc::new(AtomicBool::new(true));

        let outcome = SuiteRunner::new(&mut browser, &recorder, settings())
            .with_cancel_flag(flag)
            .run_suite(&suite)
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!((outcome.executed, outcome.skipped), (0, 2));
        assert_eq!(run.snapshot().total_tests, 0);
    }

    #[test]
    fn test_cancellation_fails_the_in_flight_case() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let mut browser = MockBrowser::new();
        let suite = suite(r#"[{ "name": "A", "actions": [{ "action": "reload" }] }]"#);
        let flag = Arc::new(AtomicBool::new(true));

        let mut runner = SuiteRunner::new(&mut browser, &recorder, settings()).with_cancel_flag(flag);
        let page = PageOptions {
            viewport: Viewport::new(800, 600),
            dialogs: Default::default(),
            action_timeout_ms: 100,
        };
        let status = runner.run_scenario(&suite, &suite.scenarios[0], &page).unwrap();

        assert_eq!(status, CaseStatus::Fail);
        let summary = run.snapshot();
        assert_eq!(summary.test_cases[0].error(), Some(CANCELLED_MESSAGE));
        assert!(summary.screenshots.is_empty());
    }

    /// Browser whose bridge dies on interrupt, the way a shared process group behaves
    struct InterruptedBrowser {
        inner: MockBrowser,
        flag: Arc<AtomicBool>,
        trigger: &'static str,
    }

    impl CaptureBackend for InterruptedBrowser {
        fn capture(&mut self, full_page: bool) -> CaptureResult<CapturedImage> {
            self.inner.capture(full_page)
        }

        fn source_type(&self) -> &str {
            "interrupted"
        }
    }

    impl BrowserDriver for InterruptedBrowser {
        fn open_page(&mut self, options: &PageOptions) -> BrowserResult<()> {
            self.inner.open_page(options)
        }

        fn close_page(&mut self) -> BrowserResult<()> {
            self.inner.close_page()
        }

        fn goto(&mut self, url: &str) -> BrowserResult<()> {
            self.inner.goto(url)
        }

        fn reload(&mut self) -> BrowserResult<()> {
            self.inner.reload()
        }

        fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
            self.inner.fill(selector, value)
        }

        fn click(&mut self, selector: &str) -> BrowserResult<()> {
            if selector == self.trigger {
                self.flag.store(true, Ordering::Relaxed);
                return Err(BrowserError::Disconnected);
            }
            self.inner.click(selector)
        }

        fn select_option(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
            self.inner.select_option(selector, value)
        }

        fn check(&mut self, selector: &str) -> BrowserResult<()> {
            self.inner.check(selector)
        }

        fn hover(&mut self, selector: &str) -> BrowserResult<()> {
            self.inner.hover(selector)
        }

        fn wait_for(
            &mut self,
            selector: &str,
            state: WaitState,
            timeout_ms: Option<u64>,
        ) -> BrowserResult<()> {
            self.inner.wait_for(selector, state, timeout_ms)
        }

        fn is_visible(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<bool> {
            self.inner.is_visible(selector, timeout_ms)
        }

        fn expect_text(&mut self, selector: &str, expected: &str) -> BrowserResult<()> {
            self.inner.expect_text(selector, expected)
        }
    }

    #[test]
    fn test_disconnect_after_interrupt_is_recorded_as_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let run = Arc::new(RunAggregator::new());
        let recorder = ScreenshotRecorder::new(dir.path(), Arc::clone(&run));
        let flag = Arc::new(AtomicBool::new(false));
        let mut browser = InterruptedBrowser {
            inner: MockBrowser::new(),
            flag: Arc::clone(&flag),
            trigger: "#accept-deal",
        };
        let suite = suite(
            r##"[
              { "name": "Workflow", "actions": [
                { "action": "step", "label": "1.5", "description": "Terms agreed" },
                { "action": "click", "selector": "#accept-deal" },
                { "action": "step", "label": "1.6", "description": "Deal accepted" }
              ] },
              { "name": "Deletion", "actions": [] }
            ]"##,
        );

        let outcome = SuiteRunner::new(&mut browser, &recorder, settings())
            .with_cancel_flag(flag)
            .run_suite(&suite)
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!((outcome.executed, outcome.failed, outcome.skipped), (1, 1, 1));

        let summary = run.snapshot();
        let case = &summary.test_cases[0];
        assert_eq!(case.error(), Some(CANCELLED_MESSAGE));
        let last = case.steps().last().unwrap();
        assert_eq!((last.label.as_str(), last.description.as_str()), ("1.6", CANCELLED_MESSAGE));
        assert!(summary.screenshots.is_empty());
        assert!(!browser.inner.calls().iter().any(|c| c.starts_with("screenshot")));
    }
}
