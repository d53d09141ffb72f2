//! buildmode - CI build-mode dispatcher
//!
//! Reads `$BUILD` and friends from the environment and runs exactly one
//! pipeline:
//!
//! - `BUILD=lint`: flake8, isort, black, mypy
//! - `BUILD=sdist`: `setup.py sdist`, then `twine upload --skip-existing`
//!   when `$RELEASE_TAG` is set
//! - anything else: `coverage run setup.py test`, then the coverage upload
//!   unless `$RUNTIME_ID` is the excluded runtime
//!
//! The process exits with the status of the first failing step.

use anyhow::{Context, Result};
use buildmode_core::{
    init_tracing, DispatchConfig, LogFormat, ModeDispatcher, OutputMode, Pipeline,
    SystemStepFactory,
};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, Level};

/// Exit status for configuration or startup errors, before any step runs.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "buildmode")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the lint, sdist or test pipeline selected by $BUILD", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and a JSON plan with --dry-run)
    #[arg(long)]
    json: bool,

    /// Print the planned steps without running them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = DispatchConfig::from_env().context("Failed to load build configuration")?;
    let timeout = config.step_timeout();
    let dispatcher = ModeDispatcher::new(config);

    if cli.dry_run {
        print_plan(&dispatcher.plan(), cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let factory = SystemStepFactory::new(timeout, OutputMode::Inherit)
        .context("Failed to initialise HTTP client")?;

    match dispatcher.run(&factory).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                mode = %report.mode,
                passed = report.passed_count(),
                failed = report.failed_count(),
                duration_ms = report.duration_ms,
                "Build succeeded"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(step = %err.step(), exit_code = err.exit_code(), "Build failed: {}", err);
            Ok(ExitCode::from(exit_byte(err.exit_code())))
        }
    }
}

fn print_plan(pipeline: &Pipeline, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(pipeline)?);
        return Ok(());
    }

    println!("Mode: {}", pipeline.mode);
    for (index, step) in pipeline.steps.iter().enumerate() {
        let marker = if step.fatal { "" } else { " (non-fatal)" };
        println!("  {}. {}{}: {}", index + 1, step.name, marker, step.describe());
    }
    Ok(())
}

/// Reduce a step's exit code to a process status byte that is never 0.
fn exit_byte(code: i32) -> u8 {
    match code & 0xff {
        _ if code < 0 => 1,
        0 => 1,
        byte => byte as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_byte_preserves_small_codes() {
        assert_eq!(exit_byte(1), 1);
        assert_eq!(exit_byte(2), 2);
        assert_eq!(exit_byte(124), 124);
        assert_eq!(exit_byte(127), 127);
    }

    #[test]
    fn test_exit_byte_never_reports_success() {
        assert_eq!(exit_byte(256), 1);
        assert_eq!(exit_byte(-1), 1);
        assert_eq!(exit_byte(257), 1);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from(["buildmode", "-v", "--json", "--dry-run"]).expect("parse");
        assert!(cli.verbose);
        assert!(cli.json);
        assert!(cli.dry_run);

        let cli = Cli::try_parse_from(["buildmode"]).expect("parse");
        assert!(!cli.verbose && !cli.json && !cli.dry_run);
    }

    #[test]
    fn test_cli_rejects_positional_args() {
        assert!(Cli::try_parse_from(["buildmode", "lint"]).is_err());
    }
}
