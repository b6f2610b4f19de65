//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::{absolute_from_cwd, config_path};
use super::Result;

/// Environment variable that overrides `defaults.tutorials_dir`
pub const TUTORIALS_DIR_ENV: &str = "TUTORIALS_DIR";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Default settings applied to every scenario
    #[serde(default)]
    pub defaults: Defaults,

    /// Description of the machine the tutorials run on
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Seed forced on scenarios with `random_seeds: true` and no own seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Interpreter used when a scenario does not name one
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Directory substituted for `@TUTORIALS_DIR@` in script paths
    #[serde(default)]
    pub tutorials_dir: Option<PathBuf>,

    /// Exit code by which a script reports it cannot run here
    #[serde(default = "default_skip_exit_code")]
    pub skip_exit_code: i32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            interpreter: None,
            tutorials_dir: None,
            skip_exit_code: default_skip_exit_code(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_skip_exit_code() -> i32 {
    77
}

/// GPU availability setting
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GpuSetting {
    /// Probe for a GPU driver tool on PATH
    #[default]
    Auto,
    /// Treat a GPU as present
    Available,
    /// Treat a GPU as absent
    Unavailable,
}

/// Capabilities of the execution environment
#[derive(Debug, Deserialize, Default)]
pub struct EnvironmentConfig {
    /// GPU availability
    #[serde(default)]
    pub gpu: GpuSetting,

    /// Features known to be available
    #[serde(default)]
    pub features: Vec<String>,

    /// Shell command printing available features, whitespace separated
    #[serde(default)]
    pub features_command: Option<String>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Resolve the tutorials directory
    ///
    /// Precedence: explicit override, then `TUTORIALS_DIR`, then the config file.
    /// A relative directory is made absolute against the current directory.
    pub fn tutorials_dir(&self, cli_override: Option<&Path>) -> Option<PathBuf> {
        let dir = if let Some(dir) = cli_override {
            dir.to_path_buf()
        } else if let Some(dir) = std::env::var_os(TUTORIALS_DIR_ENV).filter(|v| !v.is_empty()) {
            PathBuf::from(dir)
        } else {
            self.defaults.tutorials_dir.clone()?
        };
        Some(absolute_from_cwd(dir))
    }
}
