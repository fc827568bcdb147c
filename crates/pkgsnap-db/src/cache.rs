use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pkgsnap_core::{LockMode, PkgSnapError};
use tracing::{debug, info};

use crate::fs_utils::remove_dir_if_empty;
use crate::{DbLock, PackageDb};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
}

/// Deletes staged artifacts that no installed package refers to.
///
/// Cache entries live at `cache/artifacts/<name>/<version>`; an entry is kept
/// only while a record with the same name and version exists.
pub fn reconcile_cache(db: &PackageDb, lock: &DbLock<'_>) -> Result<CacheReport, PkgSnapError> {
    if lock.mode() != LockMode::Exclusive {
        return Err(PkgSnapError::LockNotHeld {
            mode: LockMode::Exclusive,
        });
    }

    let installed: HashSet<(String, String)> = db
        .query_installed(lock)?
        .into_iter()
        .map(|record| (record.name, record.version))
        .collect();

    let root = db.layout().artifacts_cache_dir();
    let mut report = CacheReport::default();
    for name_path in read_dir_sorted(&root)? {
        let Some(name) = file_name(&name_path) else {
            continue;
        };
        if !name_path.is_dir() {
            remove_path(&name_path)?;
            report.removed.push(name_path);
            continue;
        }

        for version_path in read_dir_sorted(&name_path)? {
            let referenced = file_name(&version_path)
                .is_some_and(|version| installed.contains(&(name.clone(), version)));
            if referenced && version_path.is_dir() {
                report.kept += 1;
                continue;
            }
            remove_path(&version_path)?;
            debug!(target: "pkgsnap::cache", path = %version_path.display(), "removed unreferenced artifact");
            report.removed.push(version_path);
        }

        remove_dir_if_empty(&name_path).map_err(|err| {
            PkgSnapError::io(format!("failed to prune {}", name_path.display()), err)
        })?;
    }

    info!(
        target: "pkgsnap::cache",
        removed = report.removed.len(),
        kept = report.kept,
        "artifact cache reconciled"
    );
    Ok(report)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, PkgSnapError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(PkgSnapError::io(
                format!("failed to read {}", dir.display()),
                err,
            ));
        }
    };

    let mut paths = entries
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|err| PkgSnapError::io(format!("failed to read {}", dir.display()), err))?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
}

fn remove_path(path: &Path) -> Result<(), PkgSnapError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|err| PkgSnapError::io(format!("failed to remove {}", path.display()), err))
}
