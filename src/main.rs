//! Stroi Monitor - construction-project monitoring reports
//!
//! Pulls object data from the municipal construction dashboard and writes
//! flat report files:
//! - control-point schedule reconciliation against the work ledger
//! - stalled-camera detection from progress photos
//! - video-link presence and stage plan/fact progress

mod backends;
mod cli;
mod core;
mod logging;
mod pipeline;
mod report;
mod settings;
#[cfg(test)]
mod test_support;

use clap::Parser;
use cli::{exit_codes, Cli, Commands};
use crate::core::AuthError;
use crate::report::ReportError;
use crate::settings::Settings;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output, cli.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    if let Commands::Config(args) = cli.command {
        return finish(rt.block_on(cli::config::run(args, cli.config)));
    }

    let settings = match Settings::resolve(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: could not load settings: {:#}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };

    let result = rt.block_on(async move {
        match cli.command {
            Commands::ControlPoints(args) => cli::control_points::run(args, settings).await,
            Commands::Photos(args) => cli::photos::run(args, settings).await,
            Commands::Videos(args) => cli::videos::run(args, settings).await,
            Commands::PlanFact(args) => cli::plan_fact::run(args, settings).await,
            Commands::Config(_) => Ok(()),
        }
    });
    finish(result)
}

fn finish(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            categorize_error(&e)
        }
    }
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<AuthError>().is_some() {
        return exit_codes::AUTH_FAILURE;
    }
    if let Some(ReportError::UnknownFormat(_)) = e.downcast_ref::<ReportError>() {
        return exit_codes::CONFIG_ERROR;
    }
    exit_codes::UNEXPECTED_FAILURE
}
