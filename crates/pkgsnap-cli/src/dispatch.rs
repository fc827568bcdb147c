use std::path::PathBuf;

use anyhow::Result;
use pkgsnap_core::PkgSnapError;
use pkgsnap_db::{default_root, DatabaseLayout};

use crate::config::RestoreConfig;
use crate::dump_flow::{run_dump, NOTHING_INSTALLED};
use crate::prompt::TerminalPrompter;
use crate::render::{format_restore_outcome_lines, TerminalRenderer};
use crate::restore_flow::{restore_command, RestoreOptions};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let layout = DatabaseLayout::new(resolve_root(cli.root)?);
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Dump { output } => {
            let outcome = run_dump(&layout, output.as_deref())?;
            if outcome.database_missing {
                renderer.print_warning(NOTHING_INSTALLED);
            }
        }
        Commands::Restore {
            input,
            dry_run,
            quiet,
            repository,
        } => {
            let config = RestoreConfig::load(&layout.config_path())?;
            let options = RestoreOptions {
                snapshot_path: input,
                dry_run,
                quiet,
                repository: repository.or(config.default_repository),
                assume_yes: cli.assume_yes || config.assume_yes,
                max_solve_attempts: config.max_solve_attempts,
                style: renderer.style(),
            };
            let mut prompter = TerminalPrompter::new(renderer);
            let outcome = restore_command(
                &layout,
                cli.registry_root.as_deref(),
                &options,
                &mut prompter,
            )?;
            renderer.print_lines(&format_restore_outcome_lines(&outcome, renderer.style()));
        }
    }

    Ok(())
}

fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(root) => Ok(root),
        None => default_root(),
    }
}

pub(crate) fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PkgSnapError>()
        .map(PkgSnapError::exit_code)
        .unwrap_or(1)
}
