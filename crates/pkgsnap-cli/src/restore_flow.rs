use std::fs;
use std::path::{Path, PathBuf};

use pkgsnap_core::{parse_snapshot, LockMode, PackageId, PkgSnapError, Snapshot};
use pkgsnap_db::{reconcile_cache, AccessMode, DatabaseLayout, DbLock, PackageDb};
use pkgsnap_registry::ConfiguredRegistryIndex;
use pkgsnap_resolver::{
    ApplyReport, JobFlags, JobKind, JobSet, MatchStyle, Plan, RepositorySolver, Solver,
};
use tracing::{debug, info, warn};

use crate::gate::{confirmation_gate, Confirmation};
use crate::prompt::Prompter;
use crate::render::{format_conflict_lines, format_summary_lines, OutputStyle};

pub(crate) const LOCAL_REPOSITORY: &str = "local";

#[derive(Debug, Clone)]
pub(crate) struct RestoreOptions {
    pub(crate) snapshot_path: PathBuf,
    pub(crate) dry_run: bool,
    pub(crate) quiet: bool,
    pub(crate) repository: Option<String>,
    pub(crate) assume_yes: bool,
    pub(crate) max_solve_attempts: u32,
    pub(crate) style: OutputStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RestoreOutcome {
    NoChangesNeeded { checked: usize },
    Applied { report: ApplyReport, attempts: u32 },
    Declined { dry_run: bool },
}

/// Result of one solve/confirm/apply cycle. Failures travel as `Err`.
#[derive(Debug)]
enum AttemptOutcome {
    NoChangesNeeded,
    Applied(ApplyReport),
    ConflictNeedsRetry,
    Declined,
}

/// Reads the snapshot, opens the database in the mode the options need and
/// runs the restore against the configured repositories.
pub(crate) fn restore_command(
    layout: &DatabaseLayout,
    registry_root: Option<&Path>,
    options: &RestoreOptions,
    prompter: &mut dyn Prompter,
) -> Result<RestoreOutcome, PkgSnapError> {
    // Parsed before the database is touched so a bad file never takes a lock.
    let raw = fs::read_to_string(&options.snapshot_path).map_err(|err| {
        PkgSnapError::io(
            format!("failed to read snapshot {}", options.snapshot_path.display()),
            err,
        )
    })?;
    let snapshot = parse_snapshot(&raw)?;

    let index = match registry_root {
        Some(root) => {
            if let Some(name) = options
                .repository
                .as_deref()
                .filter(|name| *name != LOCAL_REPOSITORY)
            {
                return Err(PkgSnapError::UnknownRepository {
                    name: name.to_string(),
                });
            }
            ConfiguredRegistryIndex::single(LOCAL_REPOSITORY, root)
        }
        None => ConfiguredRegistryIndex::open(layout.repos_dir(), options.repository.as_deref())?,
    };
    let mut solver = RepositorySolver::new(index);

    let access = if options.dry_run {
        AccessMode::ReadOnly
    } else {
        AccessMode::ReadWrite
    };
    let db = PackageDb::open(layout.clone(), access)?;
    let outcome = run_restore(&db, &snapshot, options, &mut solver, prompter);
    let closed = db.close();
    let outcome = outcome?;
    closed?;
    Ok(outcome)
}

/// Drives solve, confirmation and apply under one lock until the plan is
/// applied, declined or empty.
///
/// A conflicting apply is re-solved with a fresh job set. The loop gives up
/// after `max_solve_attempts` cycles, or as soon as a re-solve proposes the
/// same plan against the same database generation as the one that conflicted.
pub(crate) fn run_restore<S, P>(
    db: &PackageDb,
    snapshot: &Snapshot,
    options: &RestoreOptions,
    solver: &mut S,
    prompter: &mut P,
) -> Result<RestoreOutcome, PkgSnapError>
where
    S: Solver + ?Sized,
    P: Prompter + ?Sized,
{
    let mode = if options.dry_run {
        LockMode::ReadOnly
    } else {
        LockMode::Exclusive
    };
    let mut lock = db.lock(mode)?;
    let outcome = restore_locked(db, &lock, snapshot, options, solver, prompter);
    let released = lock.release();
    let outcome = outcome?;
    released?;
    Ok(outcome)
}

fn restore_locked<S, P>(
    db: &PackageDb,
    lock: &DbLock<'_>,
    snapshot: &Snapshot,
    options: &RestoreOptions,
    solver: &mut S,
    prompter: &mut P,
) -> Result<RestoreOutcome, PkgSnapError>
where
    S: Solver + ?Sized,
    P: Prompter + ?Sized,
{
    let max_attempts = options.max_solve_attempts.max(1);
    let mut conflicted: Option<(String, u64)> = None;

    for attempt in 1..=max_attempts {
        let jobs = build_jobs(snapshot, options)?;
        let plan = solver.solve(db, lock, &jobs)?;
        debug!(
            target: "pkgsnap::restore",
            attempt,
            actions = plan.action_count(),
            checked = plan.checked,
            "solved"
        );

        let identity = (plan.fingerprint(), plan.base_generation);
        if conflicted.as_ref() == Some(&identity) {
            return Err(PkgSnapError::apply_failed(
                "re-solving after a conflict proposed the same plan again; giving up",
            ));
        }

        match attempt_once(db, lock, &plan, options, solver, prompter)? {
            AttemptOutcome::NoChangesNeeded => {
                reconcile_after_success(db, lock, options);
                return Ok(RestoreOutcome::NoChangesNeeded {
                    checked: plan.checked,
                });
            }
            AttemptOutcome::Applied(report) => {
                if !report.messages.is_empty() {
                    prompter.show(&report.messages);
                }
                info!(
                    target: "pkgsnap::restore",
                    installed = report.installed.len(),
                    attempts = attempt,
                    "restore applied"
                );
                reconcile_after_success(db, lock, options);
                return Ok(RestoreOutcome::Applied {
                    report,
                    attempts: attempt,
                });
            }
            AttemptOutcome::Declined => {
                return Ok(RestoreOutcome::Declined {
                    dry_run: options.dry_run,
                });
            }
            AttemptOutcome::ConflictNeedsRetry => {
                prompter.show(&format_conflict_lines());
                conflicted = Some(identity);
            }
        }
    }

    Err(PkgSnapError::apply_failed(format!(
        "plan did not converge after {max_attempts} solver iteration(s)"
    )))
}

fn attempt_once<S, P>(
    db: &PackageDb,
    lock: &DbLock<'_>,
    plan: &Plan,
    options: &RestoreOptions,
    solver: &mut S,
    prompter: &mut P,
) -> Result<AttemptOutcome, PkgSnapError>
where
    S: Solver + ?Sized,
    P: Prompter + ?Sized,
{
    if plan.is_empty() {
        return Ok(AttemptOutcome::NoChangesNeeded);
    }

    let gate = confirmation_gate(options.quiet, options.dry_run, plan.action_count());
    if gate.shows_summary() {
        prompter.show(&format_summary_lines(plan, options.style));
    }
    let consent = match gate {
        Confirmation::SummaryOnly => false,
        Confirmation::Silent => options.assume_yes,
        Confirmation::SummaryAndPrompt => {
            options.assume_yes || prompter.confirm("Proceed with this action?", false)?
        }
    };
    if !consent {
        return Ok(AttemptOutcome::Declined);
    }

    prompter.begin_apply(plan.action_count());
    let applied = solver.apply(db, lock, plan);
    prompter.finish_apply(applied.is_ok());
    match applied {
        Ok(report) => Ok(AttemptOutcome::Applied(report)),
        Err(err) if err.kind().is_recoverable() => {
            warn!(target: "pkgsnap::restore", error = %err, "apply conflicted; re-solving");
            Ok(AttemptOutcome::ConflictNeedsRetry)
        }
        Err(err) => Err(err),
    }
}

fn build_jobs(snapshot: &Snapshot, options: &RestoreOptions) -> Result<JobSet, PkgSnapError> {
    let mut jobs = JobSet::new(
        JobKind::Install,
        JobFlags {
            dry_run: options.dry_run,
            version_test: true,
        },
    );
    jobs.add(MatchStyle::Glob, snapshot.iter().map(PackageId::as_str))?;
    Ok(jobs)
}

fn reconcile_after_success(db: &PackageDb, lock: &DbLock<'_>, options: &RestoreOptions) {
    if options.dry_run {
        return;
    }
    if let Err(err) = reconcile_cache(db, lock) {
        warn!(target: "pkgsnap::cache", error = %err, "artifact cache cleanup failed");
    }
}
