//! Process entry point: argument parsing, logging and the commands.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;

use std::process::ExitCode;

use clap::Parser;

/// Parse arguments, set up logging and run the requested command.
pub fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();
    let settings = commands::settings_for(&cli)?;
    let _guard = logging::init_logging(&settings)?;
    tracing::debug!(?cli, "starting");
    commands::run(cli, &settings)
}
