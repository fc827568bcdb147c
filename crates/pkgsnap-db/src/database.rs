use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use pkgsnap_core::{LockMode, PkgSnapError};
use tracing::{debug, warn};

use crate::fs_utils::write_file_durably;
use crate::records::{parse_record, serialize_record};
use crate::{DatabaseLayout, DbLock, InstallRecord};

/// How a command intends to use the database once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Query only. The database must already exist.
    ReadOnly,
    /// Query and record installs. Missing directories are created.
    ReadWrite,
}

/// Handle on the installed-package store.
///
/// Locks borrow the handle, so every [`DbLock`] is gone before
/// [`PackageDb::close`] can consume it.
#[derive(Debug)]
pub struct PackageDb {
    layout: DatabaseLayout,
    access: AccessMode,
}

impl PackageDb {
    /// Checks that the database can be used in `mode` without opening it.
    pub fn access(layout: &DatabaseLayout, mode: AccessMode) -> Result<(), PkgSnapError> {
        let db_dir = layout.db_dir();
        match mode {
            AccessMode::ReadOnly => {
                match fs::metadata(&db_dir) {
                    Ok(metadata) if metadata.is_dir() => {}
                    Ok(_) => return Err(PkgSnapError::NoDatabase { path: db_dir }),
                    Err(err) => return Err(map_access_error(err, &db_dir)),
                }
                let records_dir = layout.records_dir();
                match fs::read_dir(&records_dir) {
                    Ok(_) => Ok(()),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(map_access_error(err, &records_dir)),
                }
            }
            AccessMode::ReadWrite => {
                let records_dir = layout.records_dir();
                fs::create_dir_all(&records_dir)
                    .map_err(|err| map_access_error(err, &records_dir))?;
                let lock_path = layout.lock_path();
                open_lock_file_for_write(&lock_path)
                    .map(drop)
                    .map_err(|err| map_access_error(err, &lock_path))
            }
        }
    }

    pub fn open(layout: DatabaseLayout, mode: AccessMode) -> Result<Self, PkgSnapError> {
        Self::access(&layout, mode)?;
        debug!(target: "pkgsnap::db", root = %layout.root().display(), ?mode, "opened package database");
        Ok(Self {
            layout,
            access: mode,
        })
    }

    pub fn layout(&self) -> &DatabaseLayout {
        &self.layout
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// Takes `mode` without waiting; a conflicting holder is `LockBusy`.
    pub fn lock(&self, mode: LockMode) -> Result<DbLock<'_>, PkgSnapError> {
        if mode == LockMode::Exclusive && self.access == AccessMode::ReadOnly {
            return Err(PkgSnapError::AccessDenied {
                path: self.layout.db_dir(),
            });
        }
        let file = self.open_lock_file()?;
        DbLock::acquire(self, file, mode)
    }

    /// Installed packages ordered by name.
    pub fn query_installed(&self, lock: &DbLock<'_>) -> Result<Vec<InstallRecord>, PkgSnapError> {
        self.require_lock(lock, LockMode::ReadOnly)?;

        let dir = self.layout.records_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(PkgSnapError::io(
                    format!("failed to read package records: {}", dir.display()),
                    err,
                ));
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                PkgSnapError::io(format!("failed to read package records: {}", dir.display()), err)
            })?;
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("record") {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            records.push(read_record_file(&path)?);
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    pub fn installed_record(
        &self,
        lock: &DbLock<'_>,
        name: &str,
    ) -> Result<Option<InstallRecord>, PkgSnapError> {
        self.require_lock(lock, LockMode::ReadOnly)?;
        let path = self.layout.record_path(name);
        if !path.exists() {
            return Ok(None);
        }
        read_record_file(&path).map(Some)
    }

    /// Persists `record`, replacing any previous record for the same name,
    /// and advances the generation.
    pub fn record_install(
        &self,
        lock: &DbLock<'_>,
        record: &InstallRecord,
    ) -> Result<PathBuf, PkgSnapError> {
        self.require_lock(lock, LockMode::Exclusive)?;

        let dir = self.layout.records_dir();
        fs::create_dir_all(&dir)
            .map_err(|err| PkgSnapError::io(format!("failed to create {}", dir.display()), err))?;
        let path = self.layout.record_path(&record.name);
        let payload =
            serialize_record(record).map_err(|err| PkgSnapError::apply_failed(format!("{err:#}")))?;
        write_file_durably(&path, payload.as_bytes()).map_err(|err| {
            PkgSnapError::io(format!("failed to write package record: {}", path.display()), err)
        })?;

        let next = self.generation(lock)? + 1;
        let generation_path = self.layout.generation_path();
        write_file_durably(&generation_path, format!("{next}\n").as_bytes()).map_err(|err| {
            PkgSnapError::io(
                format!("failed to write {}", generation_path.display()),
                err,
            )
        })?;
        debug!(target: "pkgsnap::db", package = %record.id(), generation = next, "recorded install");
        Ok(path)
    }

    /// Counter advanced by every committed record write.
    pub fn generation(&self, lock: &DbLock<'_>) -> Result<u64, PkgSnapError> {
        self.require_lock(lock, LockMode::ReadOnly)?;
        let path = self.layout.generation_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(PkgSnapError::io(
                    format!("failed to read {}", path.display()),
                    err,
                ));
            }
        };
        raw.trim()
            .parse()
            .map_err(|_| PkgSnapError::CorruptRecord {
                path,
                detail: format!("invalid generation counter: {}", raw.trim()),
            })
    }

    pub fn close(self) -> Result<(), PkgSnapError> {
        debug!(target: "pkgsnap::db", root = %self.layout.root().display(), "closed package database");
        Ok(())
    }

    fn require_lock(&self, lock: &DbLock<'_>, needed: LockMode) -> Result<(), PkgSnapError> {
        debug_assert!(lock.belongs_to(self), "lock taken on another database");
        if !lock.is_held() || (needed == LockMode::Exclusive && lock.mode() != needed) {
            return Err(PkgSnapError::LockNotHeld { mode: needed });
        }
        Ok(())
    }

    fn open_lock_file(&self) -> Result<File, PkgSnapError> {
        let path = self.layout.lock_path();
        let opened = match self.access {
            AccessMode::ReadWrite => open_lock_file_for_write(&path),
            AccessMode::ReadOnly => match OpenOptions::new().read(true).open(&path) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    open_lock_file_for_write(&path)
                }
                other => other,
            },
        };
        opened.map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => PkgSnapError::AccessDenied { path },
            _ => PkgSnapError::io(format!("failed to open lock file: {}", path.display()), err),
        })
    }
}

fn open_lock_file_for_write(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

fn read_record_file(path: &Path) -> Result<InstallRecord, PkgSnapError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        PkgSnapError::io(format!("failed to read package record: {}", path.display()), err)
    })?;
    parse_record(&raw).map_err(|err| {
        warn!(target: "pkgsnap::db", path = %path.display(), "unreadable package record");
        PkgSnapError::CorruptRecord {
            path: path.to_path_buf(),
            detail: format!("{err:#}"),
        }
    })
}

fn map_access_error(err: io::Error, path: &Path) -> PkgSnapError {
    match err.kind() {
        io::ErrorKind::NotFound => PkgSnapError::NoDatabase {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => PkgSnapError::AccessDenied {
            path: path.to_path_buf(),
        },
        _ => PkgSnapError::io(
            format!("error accessing the package database: {}", path.display()),
            err,
        ),
    }
}
