//! CLI command handling
//!
//! Dispatches CLI commands to the test runner and formats output.

use std::path::Path;

use colored::Colorize;

use crate::commands::{Commands, CommonArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{
    self, Capabilities, Gate, RunOptions, Runner, ScriptExecutor, TestScenario, TestStatus,
};

/// Dispatch a CLI command
///
/// Returns whether the command succeeded; the caller maps this to the
/// process exit code.
pub async fn dispatch(command: Commands) -> Result<bool> {
    let common = command.common().clone();
    let config = load_config(&common)?;

    match command {
        Commands::Run {
            scenarios,
            check_determinism,
            json,
            ..
        } => run(&config, &common, &scenarios, check_determinism, json).await,

        Commands::Check { scenarios, .. } => check(&config, &common, &scenarios).await,

        Commands::Capabilities { json, .. } => {
            let caps = testing::detect(&config.environment).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&caps)?);
            } else {
                print_capabilities(&caps);
            }
            Ok(true)
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<Config> {
    match &common.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run_options(
    config: &Config,
    common: &CommonArgs,
    check_determinism: bool,
    print_progress: bool,
) -> RunOptions {
    RunOptions {
        tutorials_dir: config.tutorials_dir(common.tutorials_dir.as_deref()),
        default_seed: config.defaults.seed,
        default_interpreter: config.defaults.interpreter.clone(),
        check_determinism,
        print_progress,
    }
}

async fn run(
    config: &Config,
    common: &CommonArgs,
    scenarios: &[std::path::PathBuf],
    check_determinism: bool,
    json: bool,
) -> Result<bool> {
    let caps = testing::detect(&config.environment).await?;
    let executor = ScriptExecutor::new(config.defaults.skip_exit_code, common.verbose && !json);
    let runner = Runner::new(
        &executor,
        caps,
        run_options(config, common, check_determinism, !json),
    );

    // Scenarios run one after another; no state crosses between them
    let mut results = Vec::with_capacity(scenarios.len());
    for path in scenarios {
        let result = runner.run_scenario(path).await;
        tracing::debug!(scenario = %result.name, status = ?result.status, "Scenario finished");
        results.push(result);
    }

    let success = results.iter().all(|r| r.status.is_success());

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.len() > 1 {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        println!(
            "{} {} passed, {} failed, {} skipped, {} errored",
            "Summary:".bold(),
            count(TestStatus::Passed).to_string().green(),
            count(TestStatus::Failed).to_string().red(),
            count(TestStatus::Skipped).to_string().yellow(),
            count(TestStatus::Errored).to_string().red()
        );
    }

    Ok(success)
}

async fn check(
    config: &Config,
    common: &CommonArgs,
    scenarios: &[std::path::PathBuf],
) -> Result<bool> {
    let caps = testing::detect(&config.environment).await?;
    let executor = ScriptExecutor::new(config.defaults.skip_exit_code, false);
    let runner = Runner::new(&executor, caps, run_options(config, common, false, false));

    let mut success = true;
    for path in scenarios {
        match check_one(&runner, path) {
            Ok((name, Gate::Open)) => println!("  {} {} would run", "✓".green(), name),
            Ok((name, Gate::Closed(reason))) => {
                println!("  {} {} would be skipped ({})", "-".yellow(), name, reason.dimmed())
            }
            Err(e) => {
                success = false;
                println!("  {} {}: {}", "✗".red(), path.display(), e);
            }
        }
    }

    Ok(success)
}

fn check_one(runner: &Runner<'_>, path: &Path) -> Result<(String, Gate)> {
    let scenario = TestScenario::load(path)?;
    let config = runner.configure(&scenario, path)?;
    if !config.filepath().exists() {
        return Err(Error::ScriptNotFound(config.filepath().to_path_buf()));
    }
    Ok((scenario.name, runner.check(&config)))
}

fn print_capabilities(caps: &Capabilities) {
    println!(
        "GPU: {}",
        if caps.gpu {
            "available".green()
        } else {
            "unavailable".yellow()
        }
    );
    if caps.features.is_empty() {
        println!("Features: {}", "none".dimmed());
    } else {
        println!("Features:");
        for feature in &caps.features {
            println!("  {}", feature);
        }
    }
}
