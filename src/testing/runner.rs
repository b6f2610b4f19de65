//! Test runner implementation
//!
//! Executes test scenarios: the capability gate decides whether a tutorial
//! runs at all, the executor produces its results, and the scenario's
//! tolerance assertions are evaluated against them.

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::common::{paths, Error, Result};

use super::assertion::AssertionReport;
use super::capability::{self, Capabilities, Gate};
use super::config::TestScenario;
use super::executor::{Execution, ExecutionConfiguration, Executor};
use super::module::TutorialModule;

/// Lifecycle of a single tutorial run
///
/// `Pending` moves to exactly one of the terminal states. `Skipped` is
/// never followed by assertion evaluation.
#[derive(Debug)]
pub enum RunState {
    Pending,
    Skipped(String),
    Ran(TutorialModule),
}

impl RunState {
    pub fn skip(self, reason: String) -> Result<Self> {
        match self {
            RunState::Pending => Ok(RunState::Skipped(reason)),
            other => Err(invalid_transition(&other, "Skipped")),
        }
    }

    pub fn ran(self, module: TutorialModule) -> Result<Self> {
        match self {
            RunState::Pending => Ok(RunState::Ran(module)),
            other => Err(invalid_transition(&other, "Ran")),
        }
    }

    /// Consume a terminal state
    pub fn finish(self) -> Result<Loaded> {
        match self {
            RunState::Pending => Err(Error::Internal(
                "run finished while still pending".to_string(),
            )),
            RunState::Skipped(reason) => Ok(Loaded::Skipped(reason)),
            RunState::Ran(module) => Ok(Loaded::Ran(module)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RunState::Pending => "Pending",
            RunState::Skipped(_) => "Skipped",
            RunState::Ran(_) => "Ran",
        }
    }
}

fn invalid_transition(from: &RunState, to: &str) -> Error {
    Error::Internal(format!("invalid run state transition {} -> {}", from.name(), to))
}

/// A tutorial after loading: either executed or skipped
#[derive(Debug)]
pub enum Loaded {
    Ran(TutorialModule),
    Skipped(String),
}

/// Gate and execute a tutorial
///
/// The executor is not invoked when the capability gate is closed.
pub async fn load_and_configure(
    config: &ExecutionConfiguration,
    capabilities: &Capabilities,
    executor: &dyn Executor,
) -> Result<Loaded> {
    let state = RunState::Pending;

    let state = match capability::evaluate(config, capabilities) {
        Gate::Closed(reason) => {
            tracing::info!(
                script = %config.filepath().display(),
                %reason,
                "Capability gate closed"
            );
            state.skip(reason)?
        }
        Gate::Open => match executor.execute(config).await? {
            Execution::Completed(module) => state.ran(module)?,
            Execution::SkipRequested(reason) => state.skip(reason)?,
        },
    };

    state.finish()
}

/// Tri-state result of running one scenario
#[derive(Debug)]
pub enum Outcome {
    Ran(Vec<AssertionReport>),
    Skipped(String),
    Errored(Error),
}

/// Final status reported for a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Errored,
}

impl TestStatus {
    /// Whether this status lets the overall run succeed
    pub fn is_success(self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Skipped)
    }
}

/// Result of a test run
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub path: PathBuf,
    pub status: TestStatus,
    pub assertions_passed: usize,
    pub assertions_total: usize,
    pub assertions: Vec<AssertionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn from_outcome(name: String, path: PathBuf, outcome: Outcome) -> Self {
        let mut result = TestResult {
            name,
            path,
            status: TestStatus::Passed,
            assertions_passed: 0,
            assertions_total: 0,
            assertions: Vec::new(),
            skip_reason: None,
            error: None,
        };

        match outcome {
            Outcome::Ran(reports) => {
                result.assertions_total = reports.len();
                result.assertions_passed = reports.iter().filter(|r| r.passed).count();
                if result.assertions_passed != result.assertions_total {
                    result.status = TestStatus::Failed;
                }
                result.assertions = reports;
            }
            Outcome::Skipped(reason) => {
                result.status = TestStatus::Skipped;
                result.skip_reason = Some(reason);
            }
            Outcome::Errored(e) => {
                result.status = if e.is_check_failure() {
                    TestStatus::Failed
                } else {
                    TestStatus::Errored
                };
                result.error = Some(e.to_string());
            }
        }

        result
    }
}

/// Settings shared by all scenarios of one invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory substituted for `@TUTORIALS_DIR@`
    pub tutorials_dir: Option<PathBuf>,
    /// Seed used when a scenario forces seeding without naming one
    pub default_seed: u64,
    /// Interpreter used when a scenario does not name one
    pub default_interpreter: Option<String>,
    /// Run seeded scenarios twice and require identical results
    pub check_determinism: bool,
    /// Print progress to stdout
    pub print_progress: bool,
}

/// Runs scenarios against one executor and one set of capabilities
pub struct Runner<'a> {
    executor: &'a dyn Executor,
    capabilities: Capabilities,
    options: RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        capabilities: Capabilities,
        options: RunOptions,
    ) -> Self {
        Self {
            executor,
            capabilities,
            options,
        }
    }

    /// Build the execution configuration for a scenario
    ///
    /// Relative script paths resolve against the scenario file's directory.
    pub fn configure(
        &self,
        scenario: &TestScenario,
        scenario_path: &Path,
    ) -> Result<ExecutionConfiguration> {
        let tutorial = &scenario.tutorial;
        let scenario_dir = scenario_path.parent().unwrap_or(Path::new("."));

        let filepath = paths::resolve_script_path(
            &tutorial.filepath,
            scenario_dir,
            self.options.tutorials_dir.as_deref(),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Script path '{}' uses {} but no tutorials directory is configured \
                 (use --tutorials-dir or the TUTORIALS_DIR environment variable)",
                tutorial.filepath.display(),
                paths::TUTORIALS_DIR_PLACEHOLDER
            ))
        })?;

        Ok(ExecutionConfiguration::builder(filepath)
            .interpreter(
                tutorial
                    .interpreter
                    .clone()
                    .or_else(|| self.options.default_interpreter.clone()),
            )
            .args(tutorial.args.clone())
            .gpu(tutorial.gpu)
            .random_seeds(tutorial.random_seeds)
            .seed(tutorial.seed.unwrap_or(self.options.default_seed))
            .requires_features(tutorial.requires_features.clone())
            .parameters(tutorial.parameters.clone())
            .build())
    }

    /// Evaluate only the capability gate for a configured scenario
    pub fn check(&self, config: &ExecutionConfiguration) -> Gate {
        capability::evaluate(config, &self.capabilities)
    }

    /// Run a scenario that has already been loaded
    pub async fn run(&self, scenario: &TestScenario, scenario_path: &Path) -> Outcome {
        match self.try_run(scenario, scenario_path).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Errored(e),
        }
    }

    async fn try_run(&self, scenario: &TestScenario, scenario_path: &Path) -> Result<Outcome> {
        let config = self.configure(scenario, scenario_path)?;

        if self.options.check_determinism && !config.random_seeds() {
            return Err(Error::Config(format!(
                "Scenario '{}' does not force seeding; determinism cannot be checked",
                scenario.name
            )));
        }

        let module = match load_and_configure(&config, &self.capabilities, self.executor).await? {
            Loaded::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
            Loaded::Ran(module) => module,
        };

        if self.options.check_determinism {
            self.verify_repeatable(&config, &module).await?;
        }

        let reports = scenario
            .asserts
            .iter()
            .map(|assertion| assertion.evaluate(&module))
            .collect();

        Ok(Outcome::Ran(reports))
    }

    /// Re-run a seeded tutorial and compare results bit for bit
    async fn verify_repeatable(
        &self,
        config: &ExecutionConfiguration,
        first: &TutorialModule,
    ) -> Result<()> {
        tracing::debug!(
            script = %config.filepath().display(),
            "Repeating run for determinism check"
        );

        match self.executor.execute(config).await? {
            Execution::Completed(second) => match first.first_difference(&second) {
                Some(attribute) => Err(Error::NonDeterministic(attribute)),
                None => Ok(()),
            },
            Execution::SkipRequested(_) => Err(Error::NonDeterministic(
                "repeated run requested a skip".to_string(),
            )),
        }
    }

    /// Load, run and report a scenario from a YAML file
    pub async fn run_scenario(&self, path: &Path) -> TestResult {
        let scenario = match TestScenario::load(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let result =
                    TestResult::from_outcome(name, path.to_path_buf(), Outcome::Errored(e));
                self.print_result(&result, None);
                return result;
            }
        };

        if self.options.print_progress {
            println!(
                "\n{} {}",
                "Running Test:".blue().bold(),
                scenario.name.white().bold()
            );
            if let Some(desc) = &scenario.description {
                println!("  {}", desc.dimmed());
            }
        }

        let outcome = self.run(&scenario, path).await;
        let result = TestResult::from_outcome(scenario.name.clone(), path.to_path_buf(), outcome);
        self.print_result(&result, Some(&scenario));
        result
    }

    fn print_result(&self, result: &TestResult, scenario: Option<&TestScenario>) {
        if !self.options.print_progress {
            return;
        }

        if scenario.is_none() {
            println!(
                "\n{} {}",
                "Running Test:".blue().bold(),
                result.path.display().to_string().white().bold()
            );
        }

        if !result.assertions.is_empty() {
            println!("\n{}", "Assertions:".cyan());
        }
        for report in &result.assertions {
            let actual = report
                .actual
                .map(|v| v.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            if report.passed {
                println!(
                    "  {} {} = {} (expected {} ± {})",
                    "✓".green(),
                    report.attribute,
                    actual.dimmed(),
                    report.expected,
                    report.delta
                );
            } else {
                println!(
                    "  {} {}",
                    "✗".red(),
                    report.message.as_deref().unwrap_or(&report.attribute)
                );
            }
        }

        match result.status {
            TestStatus::Passed => println!(
                "\n{} {}\n",
                "✓".green().bold(),
                "Test Passed".green().bold()
            ),
            TestStatus::Skipped => println!(
                "\n{} {} ({})\n",
                "-".yellow().bold(),
                "Test Skipped".yellow().bold(),
                result.skip_reason.as_deref().unwrap_or("").dimmed()
            ),
            TestStatus::Failed | TestStatus::Errored => {
                if let Some(error) = &result.error {
                    println!("  {} {}", "✗".red(), error);
                }
                let label = if result.status == TestStatus::Failed {
                    "Test Failed"
                } else {
                    "Test Errored"
                };
                println!("\n{} {}\n", "✗".red().bold(), label.red().bold());
            }
        }
    }
}
