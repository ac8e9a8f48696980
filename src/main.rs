// CLI binary entry point for local-sync

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use local_sync::cli::{run_sync, Config, OutputFormatter, StdinPicker};
use local_sync::logging;
use local_sync::Id3TagStore;
use tracing::{debug, error};

fn main() -> ExitCode {
    let config = Config::parse();

    match logging::init(&config.state_dir(), config.verbosity()) {
        Ok(log_path) => debug!("Logging to {}", log_path.display()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let summary = run_sync(config, &Id3TagStore::new(), &StdinPicker)?;

    OutputFormatter::new(config.format, config.quiet)
        .output_summary(&summary, &mut io::stdout().lock())
        .context("Unable to write summary")?;
    Ok(())
}
