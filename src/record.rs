//! Per-scenario records: steps and the test case state machine.
//!
//! A [`TestCaseRecord`] starts `running`, collects [`StepLog`]s in execution
//! order and moves exactly once to `pass` or `fail`. After that it is frozen.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Pass,
    Fail,
}

impl StepOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StepOutcome::Pass => "pass",
            StepOutcome::Fail => "fail",
        }
    }
}

/// Status of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Running,
    Pass,
    Fail,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Running => "running",
            CaseStatus::Pass => "pass",
            CaseStatus::Fail => "fail",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CaseStatus::Running)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labeled step within a test case.
///
/// Serialized as `{ "step", "description", "status" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLog {
    /// Free-form label, usually a stage identifier like "1.2"
    #[serde(rename = "step")]
    pub label: String,

    pub description: String,

    #[serde(rename = "status")]
    pub outcome: StepOutcome,
}

/// Errors raised when a lifecycle method is called out of order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("cannot {operation} test case '{case}' while it is {status}")]
    InvalidState {
        case: String,
        operation: &'static str,
        status: CaseStatus,
    },

    #[error("test case '{case}' cannot finish as {status}: {reason}")]
    InvalidTransition {
        case: String,
        status: CaseStatus,
        reason: &'static str,
    },

    #[error("test case '{case}' was already completed")]
    DoubleCompletion { case: String },

    #[error("test case '{case}' belongs to a different run")]
    ForeignHandle { case: String },

    #[error("screenshot id {found} is out of sequence (expected {expected})")]
    OutOfSequence { expected: u32, found: u32 },
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    name: String,
    steps: Vec<StepLog>,
    status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TestCaseRecord {
    /// Create a running record with no steps
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            status: CaseStatus::Running,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepLog] {
        &self.steps
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    /// Failure message, present only when the status is `fail`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of steps with a `pass` outcome
    pub fn passed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome == StepOutcome::Pass)
            .count()
    }

    /// Append a step. Rejected once the case is terminal.
    pub fn record_step(
        &mut self,
        label: impl Into<String>,
        description: impl Into<String>,
        outcome: StepOutcome,
    ) -> Result<(), LifecycleError> {
        self.ensure_running("record a step on")?;
        self.steps.push(StepLog {
            label: label.into(),
            description: description.into(),
            outcome,
        });
        Ok(())
    }

    /// Move to a terminal status.
    ///
    /// `error` must be a non-empty message when `status` is `fail` and absent
    /// otherwise.
    pub fn finish(&mut self, status: CaseStatus, error: Option<String>) -> Result<(), LifecycleError> {
        self.ensure_running("finish")?;
        let reason = match (status, error.as_deref()) {
            (CaseStatus::Running, _) => Some("running is not a terminal status"),
            (CaseStatus::Pass, Some(_)) => Some("a passing case cannot carry an error message"),
            (CaseStatus::Fail, None) => Some("a failure message is required"),
            (CaseStatus::Fail, Some(msg)) if msg.trim().is_empty() => {
                Some("the failure message is empty")
            }
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(LifecycleError::InvalidTransition {
                case: self.name.clone(),
                status,
                reason,
            });
        }
        self.status = status;
        self.error = error;
        Ok(())
    }

    pub fn pass(&mut self) -> Result<(), LifecycleError> {
        self.finish(CaseStatus::Pass, None)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), LifecycleError> {
        self.finish(CaseStatus::Fail, Some(message.into()))
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::InvalidState {
                case: self.name.clone(),
                operation,
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_steps_keep_execution_order() {
        let mut case = TestCaseRecord::start("Workflow");
        case.record_step("1.1", "Initial load verified", StepOutcome::Pass).unwrap();
        case.record_step("1.2", "Progress details tested", StepOutcome::Pass).unwrap();
        case.record_step("2", "Demand submission", StepOutcome::Fail).unwrap();

        let labels: Vec<&str> = case.steps().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1.1", "1.2", "2"]);
        assert_eq!(case.passed_steps(), 2);
    }

    #[test]
    fn test_no_steps_after_terminal_status() {
        let mut case = TestCaseRecord::start("A");
        case.record_step("1", "setup", StepOutcome::Pass).unwrap();
        case.pass().unwrap();

        let err = case.record_step("2", "late", StepOutcome::Pass).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState { status: CaseStatus::Pass, .. }));
        assert_eq!(case.steps().len(), 1);
    }

    #[test]
    fn test_double_finish_is_rejected() {
        let mut case = TestCaseRecord::start("A");
        case.fail("boom").unwrap();
        assert!(case.pass().is_err());
        assert_eq!(case.status(), CaseStatus::Fail);
        assert_eq!(case.error(), Some("boom"));
    }

    #[test]
    fn test_failure_message_required_iff_fail() {
        let mut case = TestCaseRecord::start("A");
        assert!(matches!(
            case.finish(CaseStatus::Fail, None),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(case.finish(CaseStatus::Fail, Some("  ".into())).is_err());
        assert!(case.finish(CaseStatus::Pass, Some("oops".into())).is_err());
        assert!(case.finish(CaseStatus::Running, None).is_err());
        assert_eq!(case.status(), CaseStatus::Running);

        case.pass().unwrap();
        assert_eq!(case.error(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut case = TestCaseRecord::start("Deal Deletion Flow");
        case.record_step("1", "Deal deleted", StepOutcome::Pass).unwrap();
        case.pass().unwrap();

        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Deal Deletion Flow",
                "steps": [{ "step": "1", "description": "Deal deleted", "status": "pass" }],
                "status": "pass"
            })
        );
    }
}
