use std::path::Path;

use pkgsnap_core::{write_snapshot, ErrorKind, LockMode, PkgSnapError, Snapshot};
use pkgsnap_db::{read_installed, AccessMode, DatabaseLayout, PackageDb};
use tracing::debug;

use crate::output::OutputSink;

pub(crate) const NOTHING_INSTALLED: &str = "No packages installed.  Nothing to do!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DumpOutcome {
    pub(crate) written: usize,
    /// No database exists yet; an empty snapshot was written.
    pub(crate) database_missing: bool,
}

pub(crate) fn run_dump(
    layout: &DatabaseLayout,
    output: Option<&Path>,
) -> Result<DumpOutcome, PkgSnapError> {
    let (snapshot, database_missing) = match PackageDb::open(layout.clone(), AccessMode::ReadOnly) {
        Ok(db) => {
            let snapshot = snapshot_of(&db);
            let closed = db.close();
            let snapshot = snapshot?;
            closed?;
            (snapshot, false)
        }
        Err(err) if err.kind() == ErrorKind::NoDatabase => {
            debug!(target: "pkgsnap::db", error = %err, "no database to dump");
            (Snapshot::default(), true)
        }
        Err(err) => return Err(err),
    };

    let mut sink = OutputSink::create(output)?;
    write_snapshot(&snapshot, &mut sink)
        .map_err(|err| PkgSnapError::io("failed to write snapshot", err))?;
    sink.finish()?;

    Ok(DumpOutcome {
        written: snapshot.len(),
        database_missing,
    })
}

fn snapshot_of(db: &PackageDb) -> Result<Snapshot, PkgSnapError> {
    let mut lock = db.lock(LockMode::ReadOnly)?;
    let snapshot = read_installed(db, &lock);
    let released = lock.release();
    let snapshot = snapshot?;
    released?;
    Ok(snapshot)
}
