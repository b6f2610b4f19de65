//! CLI command definitions
//!
//! Defines the clap commands for the tutorial test CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run test scenarios defined in YAML files
    Run {
        /// Paths to the YAML test scenario files
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Run seeded tutorials twice and require bit-identical results
        #[arg(long)]
        check_determinism: bool,

        /// Print a JSON report instead of human-readable output
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Report whether scenarios would run or be skipped, without running them
    Check {
        /// Paths to the YAML test scenario files
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show the capabilities detected in this environment
    Capabilities {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by all commands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Directory substituted for @TUTORIALS_DIR@ in script paths
    #[arg(long)]
    pub tutorials_dir: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose output (script output, debug logging)
    #[arg(long, short)]
    pub verbose: bool,
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::Run { common, .. }
            | Commands::Check { common, .. }
            | Commands::Capabilities { common, .. } => common,
        }
    }
}
