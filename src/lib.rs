//! Scenario Report - browser scenario runs aggregated into screenshot reports.
//!
//! This crate provides:
//! - A run aggregator collecting test cases, step logs and screenshots
//! - A screenshot recorder with gapless, run-ordered file numbering
//! - HTML, JSON and text report rendering from one run summary
//! - A declarative scenario harness driving a Playwright browser (or a mock)
//! - A connectivity check for the hosted data store behind the app
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scenario_report::{RunAggregator, ScreenshotRecorder};
//! use scenario_report::browser::{BrowserDriver, DialogPolicy, MockBrowser, PageOptions, Viewport};
//! use scenario_report::record::StepOutcome;
//! use scenario_report::report::{RenderOptions, ReportRenderer};
//!
//! let run = Arc::new(RunAggregator::new());
//! let recorder = ScreenshotRecorder::new("test-screenshots", Arc::clone(&run));
//! let mut browser = MockBrowser::new();
//! browser
//!     .open_page(&PageOptions {
//!         viewport: Viewport::new(1920, 1080),
//!         dialogs: DialogPolicy::Accept,
//!         action_timeout_ms: 10_000,
//!     })
//!     .unwrap();
//!
//! let mut case = run.begin_case("Complete Workflow");
//! recorder.capture(&mut browser, "initial-load", true, "Initial state").unwrap();
//! case.record_step("1.1", "Initial load verified", StepOutcome::Pass).unwrap();
//! case.pass().unwrap();
//! run.complete_case(&mut case).unwrap();
//!
//! let renderer = ReportRenderer::new(RenderOptions::default());
//! let outcome = renderer.render(&run.snapshot(), std::path::Path::new("test-reports"));
//! assert!(outcome.is_complete());
//! ```

pub mod aggregator;
pub mod browser;
pub mod capture;
pub mod config;
pub mod datastore;
pub mod harness;
pub mod layout;
pub mod record;
pub mod report;

// Re-export run aggregation types
pub use aggregator::{CaseHandle, RunAggregator, RunSummary};
pub use record::{CaseStatus, LifecycleError, StepLog, StepOutcome, TestCaseRecord};

// Re-export capture types
pub use capture::{CaptureBackend, CaptureError, ScreenshotRecord, ScreenshotRecorder};

// Re-export report rendering
pub use report::{RenderOptions, RenderOutcome, ReportRenderer};

// Re-export the harness
pub use harness::{HarnessError, HarnessResult, Suite, SuiteOutcome, SuiteRunner};
pub use layout::OutputLayout;
