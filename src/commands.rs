// src/commands.rs
//! Command handlers for the viewmig CLI

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};
use viewmig::domain::{translate_domain, ConditionParsing};
use viewmig::pipeline::{CancelToken, Pipeline, RunSummary};
use viewmig::progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
use viewmig::rewrite::RuleId;
use viewmig::ConvertConfig;

use crate::cli::Cli;

/// Flags given on the command line for `convert`
///
/// Anything set here wins over the configuration file.
#[derive(Debug, Default)]
pub struct ConvertOverrides {
    pub source_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub no_backup: bool,
    pub extensions: Vec<String>,
    pub skip: Vec<String>,
    pub workers: Option<usize>,
    pub dry_run: bool,
    pub source_rewrite: bool,
    pub basic_conditions: bool,
    pub report: Option<PathBuf>,
}

impl ConvertOverrides {
    /// Load the configuration file (if any) and apply the flags on top
    pub fn resolve(self) -> Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ConvertConfig::default(),
        };

        if let Some(dir) = self.source_dir {
            config.source_dir = dir;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if self.no_backup {
            config.backup = false;
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions;
        }
        config.skip_patterns.extend(self.skip);
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.dry_run |= self.dry_run;
        config.enable_source_rewrite |= self.source_rewrite;
        if self.basic_conditions {
            config.advanced_conditions = false;
        }
        if self.report.is_some() {
            config.report_file = self.report;
        }
        Ok(config)
    }
}

fn progress_for(quiet: bool) -> Box<dyn ProgressTracker> {
    if quiet {
        Box::new(SilentProgress::new())
    } else if std::io::stderr().is_terminal() {
        Box::new(CliProgress::new("Converting", 0))
    } else {
        Box::new(LogProgress::new("convert", 0))
    }
}

/// Run a conversion and print the summary
pub fn cmd_convert(config: ConvertConfig, quiet: bool, cancel: &CancelToken) -> Result<RunSummary> {
    debug!("Effective configuration: {:?}", config);
    if config.dry_run {
        info!("Dry run: no files will be written");
    }

    let pipeline = Pipeline::new(config).with_progress(progress_for(quiet));
    let summary = pipeline.run(cancel)?;

    print_summary(&summary);
    if let Some(report) = &pipeline.config().report_file {
        println!("Report written to {}", report.display());
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.dry_run {
        println!("Conversion summary (dry run, nothing written)");
    } else {
        println!("Conversion summary");
    }
    println!("  Files processed: {}", summary.files_processed);
    println!("  Files changed:   {}", summary.files_changed);
    println!("  Files skipped:   {}", summary.files_skipped);
    println!("  Files with errors: {}", summary.files_error);
    println!("  Time: {:.2}s", summary.duration().as_secs_f64());

    if !summary.totals.is_empty() {
        println!();
        println!("  {:<14} {:>8} {:>8} {:>8}", "Rule", "Changed", "Kept", "Errors");
        for rule in RuleId::ALL {
            let count = summary.totals.get(rule);
            if count.is_zero() {
                continue;
            }
            println!(
                "  {:<14} {:>8} {:>8} {:>8}",
                rule.label(),
                count.changed,
                count.unconverted + count.warnings,
                count.errors
            );
        }
    }

    let errored: Vec<_> = summary.errored_files().collect();
    if !errored.is_empty() {
        println!();
        println!("Files with errors:");
        for file in errored {
            println!("  {}: {}", file.path.display(), file.errors.join("; "));
        }
    }

    if summary.interrupted {
        println!();
        println!(
            "Interrupted: {} of {} files were converted",
            summary.files_processed, summary.files_discovered
        );
    }
}

/// Print the expression form of one domain
pub fn cmd_translate(domain: &str, basic: bool) -> Result<()> {
    let mode = if basic {
        ConditionParsing::Basic
    } else {
        ConditionParsing::Advanced
    };
    let expression =
        translate_domain(domain, mode).with_context(|| format!("Cannot translate {}", domain))?;
    println!("{}", expression);
    Ok(())
}

/// Write a completion script for `shell` to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
