//! Run-wide accumulator of test cases and screenshots.
//!
//! One [`RunAggregator`] is created per run and shared (usually behind an
//! `Arc`) by everything that records results. All shared state sits behind a
//! single mutex, so screenshot id assignment and counter updates stay
//! consistent when scenarios run on several threads.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::capture::{CaptureResult, ScreenshotRecord};
use crate::record::{CaseStatus, LifecycleError, StepOutcome, TestCaseRecord};

/// Immutable view of a run, and the canonical JSON report shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_tests: u32,
    pub passed_tests: u32,
    pub failed_tests: u32,
    pub screenshots: Vec<ScreenshotRecord>,
    pub test_cases: Vec<TestCaseRecord>,
}

impl RunSummary {
    /// Percentage of passed tests, `None` for an empty run
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_tests > 0)
            .then(|| f64::from(self.passed_tests) / f64::from(self.total_tests) * 100.0)
    }

    /// Cases that were started but never reached the aggregator
    pub fn unfinished_tests(&self) -> u32 {
        self.total_tests
            .saturating_sub(self.passed_tests.saturating_add(self.failed_tests))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load a summary previously written as `test-results.json`
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw).map_err(std::io::Error::other)
    }
}

#[derive(Debug, Default)]
struct RunState {
    summary: RunSummary,
    next_case_id: u64,
}

/// Process-wide accumulator for a single run
#[derive(Debug, Default)]
pub struct RunAggregator {
    state: Mutex<RunState>,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a test case. Counts toward `total` immediately.
    pub fn begin_case(&self, name: impl Into<String>) -> CaseHandle<'_> {
        let mut state = self.state.lock();
        state.summary.total_tests += 1;
        state.next_case_id += 1;
        CaseHandle {
            aggregator: self,
            id: state.next_case_id,
            record: TestCaseRecord::start(name),
            completed: false,
        }
    }

    /// Hand a finished case over to the run.
    ///
    /// The case must be terminal; a handle can be completed only once.
    pub fn complete_case(&self, handle: &mut CaseHandle<'_>) -> Result<(), LifecycleError> {
        let case = handle.record.name().to_string();
        if !std::ptr::eq(handle.aggregator, self) {
            return Err(LifecycleError::ForeignHandle { case });
        }
        if handle.completed {
            return Err(LifecycleError::DoubleCompletion { case });
        }

        let status = handle.record.status();
        let mut state = self.state.lock();
        match status {
            CaseStatus::Running => {
                return Err(LifecycleError::InvalidState {
                    case,
                    operation: "complete",
                    status,
                });
            }
            CaseStatus::Pass => state.summary.passed_tests += 1,
            CaseStatus::Fail => state.summary.failed_tests += 1,
        }
        state.summary.test_cases.push(handle.record.clone());
        handle.completed = true;
        drop(state);

        info!(case = %case, status = %status, "Test case completed");
        Ok(())
    }

    /// Append an already persisted screenshot. Its id must be the next in sequence.
    pub fn record_screenshot(&self, record: ScreenshotRecord) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        let expected = next_screenshot_id(&state.summary);
        if record.id != expected {
            return Err(LifecycleError::OutOfSequence {
                expected,
                found: record.id,
            });
        }
        state.summary.screenshots.push(record);
        Ok(())
    }

    /// Assign the next screenshot id and append whatever `persist` builds for it.
    ///
    /// The lock is held while `persist` runs, so ids stay dense even with
    /// concurrent callers; if `persist` fails or returns a record with
    /// another id, the id is not consumed.
    pub fn record_screenshot_with<F>(&self, persist: F) -> CaptureResult<ScreenshotRecord>
    where
        F: FnOnce(u32) -> CaptureResult<ScreenshotRecord>,
    {
        let mut state = self.state.lock();
        let id = next_screenshot_id(&state.summary);
        let record = persist(id)?;
        if record.id != id {
            return Err(LifecycleError::OutOfSequence {
                expected: id,
                found: record.id,
            }
            .into());
        }
        state.summary.screenshots.push(record.clone());
        Ok(record)
    }

    /// Deep copy of the current run state
    pub fn snapshot(&self) -> RunSummary {
        self.state.lock().summary.clone()
    }

    pub fn screenshot_count(&self) -> usize {
        self.state.lock().summary.screenshots.len()
    }
}

fn next_screenshot_id(summary: &RunSummary) -> u32 {
    u32::try_from(summary.screenshots.len()).map_or(u32::MAX, |n| n.saturating_add(1))
}

/// A running test case bound to its aggregator.
///
/// Dropping a handle that was never completed records the case as failed,
/// so an early return or panic cannot leave a case `running`.
#[derive(Debug)]
pub struct CaseHandle<'a> {
    aggregator: &'a RunAggregator,
    id: u64,
    record: TestCaseRecord,
    completed: bool,
}

impl CaseHandle<'_> {
    /// Per-run case number, starting at 1
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn status(&self) -> CaseStatus {
        self.record.status()
    }

    pub fn record(&self) -> &TestCaseRecord {
        &self.record
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn record_step(
        &mut self,
        label: impl Into<String>,
        description: impl Into<String>,
        outcome: StepOutcome,
    ) -> Result<(), LifecycleError> {
        self.record.record_step(label, description, outcome)
    }

    pub fn finish(&mut self, status: CaseStatus, error: Option<String>) -> Result<(), LifecycleError> {
        self.record.finish(status, error)
    }

    pub fn pass(&mut self) -> Result<(), LifecycleError> {
        self.record.pass()
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), LifecycleError> {
        self.record.fail(message)
    }
}

impl Drop for CaseHandle<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if self.record.status() == CaseStatus::Running {
            warn!(case = %self.record.name(), "Test case dropped while running, recording failure");
            let _ = self.record.fail("scenario aborted before completion");
        }
        let aggregator = self.aggregator;
        if let Err(err) = aggregator.complete_case(self) {
            warn!("Could not complete dropped test case: {err}");
        }
    }
}
