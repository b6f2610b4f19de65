//! Tutorial harness - regression tests for simulation tutorials
//!
//! This library runs externally located tutorial scripts under a fixed
//! configuration and checks the numbers they report against reference
//! values with absolute tolerances.

pub mod cli;
pub mod commands;
pub mod common;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{assert_close, ExecutionConfiguration, TestScenario, TutorialModule};
