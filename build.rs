// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("viewmig")
        .version(env!("CARGO_PKG_VERSION"))
        .author("viewmig contributors")
        .about("Convert legacy view markup to the current syntax")
        .arg(flag("verbose", "verbose", "Enable debug logging").short('v').global(true))
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .value_name("PATH")
                .global(true)
                .help("Also write logs to this file"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a directory tree of view files")
                .arg(Arg::new("source_dir").help("Directory to convert"))
                .arg(Arg::new("config").short('c').long("config").value_name("PATH").help("TOML configuration file"))
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Write converted files under this directory instead of in place"),
                )
                .arg(flag("no_backup", "no-backup", "Do not keep .bak copies of rewritten files"))
                .arg(
                    Arg::new("extension")
                        .short('e')
                        .long("extension")
                        .action(ArgAction::Append)
                        .value_name("EXT")
                        .help("File extensions to process (repeatable)"),
                )
                .arg(
                    Arg::new("skip")
                        .short('s')
                        .long("skip")
                        .action(ArgAction::Append)
                        .value_name("REGEX")
                        .help("Regex of paths to skip (repeatable)"),
                )
                .arg(Arg::new("workers").short('w').long("workers").help("Number of worker threads"))
                .arg(flag("dry_run", "dry-run", "Show what would change without writing").short('d'))
                .arg(flag(
                    "source_rewrite",
                    "source-rewrite",
                    "Also rewrite view_mode values in Python sources and action records",
                ))
                .arg(flag("basic_conditions", "basic-conditions", "Only translate flat domains"))
                .arg(Arg::new("report").short('r').long("report").value_name("PATH").help("Write a JSON report here"))
                .arg(flag("quiet", "quiet", "Hide the progress bar").short('q')),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a single domain to an expression")
                .arg(Arg::new("domain").required(true).help("Domain text"))
                .arg(flag("basic", "basic", "Only accept flat domains")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("viewmig.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
