//! Tutorial test runner
//!
//! Reads YAML test scenarios, gates each on the capabilities of the
//! current environment, runs the tutorial script with forced seeding and
//! checks its reported results against tolerance assertions.

mod assertion;
mod capability;
mod config;
mod executor;
mod module;
mod runner;

pub use assertion::{assert_close, AssertionReport, AttributePath, ToleranceAssertion};
pub use capability::{detect, evaluate, Capabilities, Gate};
pub use config::*;
pub use executor::{
    Execution, ExecutionConfiguration, ExecutionConfigurationBuilder, Executor, ScriptExecutor,
};
pub use module::{TutorialModule, Value};
pub use runner::{
    load_and_configure, Loaded, Outcome, RunOptions, RunState, Runner, TestResult, TestStatus,
};
