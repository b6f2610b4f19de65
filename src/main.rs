//! Tutorial test CLI - regression tests for simulation tutorials
//!
//! Runs tutorial scripts with forced seeding, skips them when the
//! environment lacks required capabilities, and checks their results
//! against reference values with absolute tolerances.

use clap::Parser;
use tutorial_harness::{cli, commands, common::logging};
use commands::Commands;

#[derive(Parser)]
#[command(name = "tutorial-test", about = "Regression test runner for simulation tutorials")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.command.common().verbose);

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
