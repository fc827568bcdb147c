use pkgsnap_core::{PkgSnapError, Snapshot};

use crate::{DbLock, PackageDb};

/// Identifiers of every installed package, in record order. An empty
/// database yields an empty snapshot.
pub fn read_installed(db: &PackageDb, lock: &DbLock<'_>) -> Result<Snapshot, PkgSnapError> {
    Ok(db
        .query_installed(lock)?
        .iter()
        .map(|record| record.id())
        .collect())
}
