// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use viewmig::pipeline::CancelToken;

mod cli;
mod commands;

use cli::{Cli, Commands};

/// Exit status when the run was cut short by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Convert {
            source_dir,
            config,
            output_dir,
            no_backup,
            extensions,
            skip,
            workers,
            dry_run,
            source_rewrite,
            basic_conditions,
            report,
            quiet,
        } => {
            let config = commands::ConvertOverrides {
                source_dir,
                config,
                output_dir,
                no_backup,
                extensions,
                skip,
                workers,
                dry_run,
                source_rewrite,
                basic_conditions,
                report,
            }
            .resolve()?;

            let cancel = CancelToken::new();
            let handler_token = cancel.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                warn!("Interrupt received, finishing files in progress");
                handler_token.cancel();
            }) {
                warn!("Could not install interrupt handler: {}", e);
            }

            let summary = commands::cmd_convert(config, quiet, &cancel)?;
            if summary.interrupted {
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Commands::Translate { domain, basic } => {
            commands::cmd_translate(&domain, basic)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            commands::cmd_completions(shell)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
