pub mod runner;
pub mod types;

pub use runner::{RunnerSettings, ScenarioError, SuiteOutcome, SuiteRunner};
pub use types::{Action, Candidate, HarnessError, HarnessResult, Scenario, Suite};
