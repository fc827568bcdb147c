use pkgsnap_core::PkgSnapError;
use pkgsnap_db::{DbLock, PackageDb};

use crate::{ApplyReport, JobSet, Plan};

/// Computes and applies installation plans.
///
/// `apply` returns `ApplyConflict` when the database or the repository no
/// longer matches what `solve` saw; callers re-solve with a fresh job set.
pub trait Solver {
    fn solve(
        &mut self,
        db: &PackageDb,
        lock: &DbLock<'_>,
        jobs: &JobSet,
    ) -> Result<Plan, PkgSnapError>;

    fn apply(
        &mut self,
        db: &PackageDb,
        lock: &DbLock<'_>,
        plan: &Plan,
    ) -> Result<ApplyReport, PkgSnapError>;
}
