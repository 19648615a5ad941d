// src/cli.rs
//! CLI definitions for viewmig
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "viewmig")]
#[command(author = "viewmig contributors")]
#[command(version)]
#[command(about = "Convert legacy view markup to the current syntax", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a directory tree of view files
    Convert {
        /// Directory to convert (overrides the config file)
        source_dir: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Write converted files under this directory instead of in place
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Do not keep .bak copies of rewritten files
        #[arg(long)]
        no_backup: bool,

        /// File extensions to process (repeatable)
        #[arg(short, long = "extension", value_name = "EXT")]
        extensions: Vec<String>,

        /// Regex of paths to skip (repeatable)
        #[arg(short, long = "skip", value_name = "REGEX")]
        skip: Vec<String>,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Show what would change without writing
        #[arg(short, long)]
        dry_run: bool,

        /// Also rewrite view_mode values in Python sources and action records
        #[arg(long)]
        source_rewrite: bool,

        /// Only translate flat domains
        #[arg(long)]
        basic_conditions: bool,

        /// Write a JSON report here
        #[arg(short, long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Translate a single domain to an expression
    Translate {
        /// Domain text, e.g. "[('state', '=', 'draft')]"
        domain: String,

        /// Only accept flat domains
        #[arg(long)]
        basic: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert_flags() {
        let cli = Cli::try_parse_from([
            "viewmig", "convert", "addons", "-e", ".xml", "-e", "py", "-s", "/tests/", "-w", "4",
            "--dry-run", "--no-backup", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Convert {
                source_dir,
                extensions,
                skip,
                workers,
                dry_run,
                no_backup,
                ..
            } => {
                assert_eq!(source_dir, Some(PathBuf::from("addons")));
                assert_eq!(extensions, vec![".xml", "py"]);
                assert_eq!(skip, vec!["/tests/"]);
                assert_eq!(workers, Some(4));
                assert!(dry_run);
                assert!(no_backup);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_usage_error() {
        assert!(Cli::try_parse_from(["viewmig", "convert", "-w", "many"]).is_err());
    }
}
