use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod dispatch;
mod dump_flow;
mod gate;
mod output;
mod prompt;
mod render;
mod restore_flow;

use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "pkgsnap")]
#[command(about = "Snapshot installed packages and restore a host to a snapshot", long_about = None)]
struct Cli {
    /// Package database root (defaults to ~/.pkgsnap).
    #[arg(long, global = true, env = "PKGSNAP_ROOT")]
    root: Option<PathBuf>,
    /// Use this repository directory instead of the configured sources.
    #[arg(long, global = true)]
    registry_root: Option<PathBuf>,
    /// Answer yes to the confirmation prompt.
    #[arg(
        short = 'y',
        long = "yes",
        global = true,
        env = "PKGSNAP_ASSUME_YES",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    assume_yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the installed package set as a JSON array.
    Dump {
        /// Output file; standard output when omitted.
        #[arg(short = 'f', long = "output")]
        output: Option<PathBuf>,
    },
    /// Install whatever a snapshot lists that is missing or outdated.
    Restore {
        /// Snapshot file to restore from.
        #[arg(short = 'f', long = "output")]
        input: PathBuf,
        /// Show the plan without changing anything.
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Skip the summary unless this is a dry run.
        #[arg(short = 'q', long)]
        quiet: bool,
        /// Resolve only from the named repository.
        #[arg(short = 'r', long)]
        repository: Option<String>,
    },
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(dispatch::exit_code_for(&err))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PKGSNAP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}
