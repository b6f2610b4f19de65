//! Tutorial execution
//!
//! Runs a tutorial script as a child process and collects the results it
//! writes. The script learns how it is being run from environment
//! variables:
//!
//! | variable | meaning |
//! |---|---|
//! | `TUTORIAL_RESULTS_FILE` | where to write the JSON results object |
//! | `TUTORIAL_RANDOM_SEEDS` | `1` when seeding is forced, else `0` |
//! | `TUTORIAL_SEED` | the forced seed (only when seeding is forced) |
//! | `TUTORIAL_GPU` | `1` when GPU code paths are enabled, else `0` |
//! | `TUTORIAL_PARAMETERS` | JSON object of scenario parameters |
//!
//! A script that finds it cannot run in this environment exits with the
//! skip exit code (77 by default).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use super::module::TutorialModule;
use crate::common::{Error, Result};

pub const ENV_RESULTS_FILE: &str = "TUTORIAL_RESULTS_FILE";
pub const ENV_RANDOM_SEEDS: &str = "TUTORIAL_RANDOM_SEEDS";
pub const ENV_SEED: &str = "TUTORIAL_SEED";
pub const ENV_GPU: &str = "TUTORIAL_GPU";
pub const ENV_PARAMETERS: &str = "TUTORIAL_PARAMETERS";

const RESULTS_FILE_NAME: &str = "results.json";

/// How to run one tutorial
///
/// Built once per run and only read afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionConfiguration {
    filepath: PathBuf,
    interpreter: Option<String>,
    args: Vec<String>,
    gpu: bool,
    random_seeds: bool,
    seed: u64,
    requires_features: Vec<String>,
    parameters: BTreeMap<String, serde_json::Value>,
}

impl ExecutionConfiguration {
    pub fn builder(filepath: PathBuf) -> ExecutionConfigurationBuilder {
        ExecutionConfigurationBuilder {
            config: ExecutionConfiguration {
                filepath,
                interpreter: None,
                args: Vec::new(),
                gpu: false,
                random_seeds: false,
                seed: 42,
                requires_features: Vec::new(),
                parameters: BTreeMap::new(),
            },
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn gpu(&self) -> bool {
        self.gpu
    }

    pub fn random_seeds(&self) -> bool {
        self.random_seeds
    }

    /// The seed forced on the script, if seeding is forced
    pub fn seed(&self) -> Option<u64> {
        self.random_seeds.then_some(self.seed)
    }

    pub fn requires_features(&self) -> &[String] {
        &self.requires_features
    }

    pub fn parameters(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.parameters
    }

    /// Environment variables describing this configuration to the script
    pub fn script_env(&self, results_file: &Path) -> Result<Vec<(&'static str, String)>> {
        let mut vars = vec![
            (ENV_RESULTS_FILE, results_file.display().to_string()),
            (ENV_RANDOM_SEEDS, flag(self.random_seeds).to_string()),
            (ENV_GPU, flag(self.gpu).to_string()),
            (ENV_PARAMETERS, serde_json::to_string(&self.parameters)?),
        ];
        if let Some(seed) = self.seed() {
            vars.push((ENV_SEED, seed.to_string()));
        }
        Ok(vars)
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Builder for [`ExecutionConfiguration`]
#[derive(Debug)]
pub struct ExecutionConfigurationBuilder {
    config: ExecutionConfiguration,
}

impl ExecutionConfigurationBuilder {
    pub fn interpreter(mut self, interpreter: Option<String>) -> Self {
        self.config.interpreter = interpreter;
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.config.args = args;
        self
    }

    pub fn gpu(mut self, gpu: bool) -> Self {
        self.config.gpu = gpu;
        self
    }

    pub fn random_seeds(mut self, random_seeds: bool) -> Self {
        self.config.random_seeds = random_seeds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn requires_features(mut self, features: Vec<String>) -> Self {
        self.config.requires_features = features;
        self
    }

    pub fn parameters(mut self, parameters: BTreeMap<String, serde_json::Value>) -> Self {
        self.config.parameters = parameters;
        self
    }

    pub fn build(self) -> ExecutionConfiguration {
        self.config
    }
}

/// What a finished execution produced
#[derive(Debug)]
pub enum Execution {
    /// The script ran and reported results
    Completed(TutorialModule),
    /// The script reported that it cannot run in this environment
    SkipRequested(String),
}

/// Runs tutorials
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, config: &ExecutionConfiguration) -> Result<Execution>;
}

/// Executes tutorial scripts as child processes
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    skip_exit_code: i32,
    verbose: bool,
}

impl ScriptExecutor {
    pub fn new(skip_exit_code: i32, verbose: bool) -> Self {
        Self {
            skip_exit_code,
            verbose,
        }
    }

    fn command(&self, config: &ExecutionConfiguration, script: &Path) -> TokioCommand {
        let mut cmd = match config.interpreter() {
            Some(interpreter) => {
                let mut cmd = TokioCommand::new(interpreter);
                cmd.arg(script);
                cmd
            }
            None => TokioCommand::new(script),
        };
        cmd.args(config.args());
        if let Some(dir) = script.parent() {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Executor for ScriptExecutor {
    async fn execute(&self, config: &ExecutionConfiguration) -> Result<Execution> {
        let script = config
            .filepath()
            .canonicalize()
            .map_err(|_| Error::ScriptNotFound(config.filepath().to_path_buf()))?;
        if !script.is_file() {
            return Err(Error::ScriptNotFound(script));
        }

        // Removed on drop, after the results are read
        let workdir = tempfile::tempdir()?;
        let results_file = workdir.path().join(RESULTS_FILE_NAME);

        let mut cmd = self.command(config, &script);
        for (key, value) in config.script_env(&results_file)? {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        tracing::info!(
            script = %script.display(),
            seed = ?config.seed(),
            gpu = config.gpu(),
            "Executing tutorial"
        );

        let output = cmd.output().await.map_err(|e| Error::ScriptLaunch {
            path: script.clone(),
            error: e.to_string(),
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if self.verbose && !stderr.is_empty() {
            eprint!("{}", stderr);
        }

        if output.status.code() == Some(self.skip_exit_code) {
            let reason = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!("script requested skip (exit code {})", self.skip_exit_code)
                });
            tracing::info!(script = %script.display(), %reason, "Tutorial requested skip");
            return Ok(Execution::SkipRequested(reason));
        }

        if !output.status.success() {
            return Err(Error::ScriptFailed {
                path: script,
                code: output.status.code(),
                stderr,
            });
        }

        let content = match tokio::fs::read_to_string(&results_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingResults(script))
            }
            Err(e) => {
                return Err(Error::FileRead {
                    path: results_file.display().to_string(),
                    error: e.to_string(),
                })
            }
        };

        let module = TutorialModule::from_json(&content, &script)?;
        tracing::debug!(attributes = module.len(), "Collected tutorial results");

        Ok(Execution::Completed(module))
    }
}
