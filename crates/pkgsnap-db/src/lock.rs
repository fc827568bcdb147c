use std::fs::File;
use std::io;

use pkgsnap_core::{LockMode, PkgSnapError};
use tracing::{debug, warn};

use crate::PackageDb;

/// Advisory lock on a [`PackageDb`], held until released or dropped.
#[derive(Debug)]
pub struct DbLock<'db> {
    db: &'db PackageDb,
    mode: LockMode,
    file: Option<File>,
}

impl<'db> DbLock<'db> {
    pub(crate) fn acquire(
        db: &'db PackageDb,
        file: File,
        mode: LockMode,
    ) -> Result<Self, PkgSnapError> {
        // Fully qualified: std's File gained inherent lock methods with other signatures.
        let attempt = match mode {
            LockMode::ReadOnly => fs2::FileExt::try_lock_shared(&file),
            LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
        };
        if let Err(err) = attempt {
            if is_contended(&err) {
                debug!(target: "pkgsnap::lock", %mode, "lock is held by another process");
                return Err(PkgSnapError::LockBusy { mode });
            }
            return Err(PkgSnapError::io(
                format!(
                    "failed to lock {}",
                    db.layout().lock_path().display()
                ),
                err,
            ));
        }

        debug!(target: "pkgsnap::lock", %mode, "acquired database lock");
        Ok(Self {
            db,
            mode,
            file: Some(file),
        })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), PkgSnapError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        fs2::FileExt::unlock(&file).map_err(|err| {
            PkgSnapError::io(
                format!(
                    "failed to release lock {}",
                    self.db.layout().lock_path().display()
                ),
                err,
            )
        })?;
        debug!(target: "pkgsnap::lock", mode = %self.mode, "released database lock");
        Ok(())
    }

    pub(crate) fn belongs_to(&self, db: &PackageDb) -> bool {
        std::ptr::eq(self.db, db)
    }
}

impl Drop for DbLock<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(target: "pkgsnap::lock", error = %err, "failed to release database lock");
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == io::ErrorKind::WouldBlock
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error())
}
