use std::io;
use std::path::PathBuf;

use crate::LockMode;

/// Coarse classification of every failure a command can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    NoDatabase,
    LockBusy,
    ParseError,
    UnsatisfiableTargets,
    ApplyConflict,
    ApplyFailed,
    IoError,
}

impl ErrorKind {
    /// Only a conflicting apply is handled internally by re-solving.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::ApplyConflict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::NoDatabase => "no_database",
            Self::LockBusy => "lock_busy",
            Self::ParseError => "parse_error",
            Self::UnsatisfiableTargets => "unsatisfiable_targets",
            Self::ApplyConflict => "apply_conflict",
            Self::ApplyFailed => "apply_failed",
            Self::IoError => "io_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PkgSnapError {
    #[error("insufficient privileges to access the package database: {}", path.display())]
    AccessDenied { path: PathBuf },

    #[error("no package database found at {}", path.display())]
    NoDatabase { path: PathBuf },

    #[error("repository '{name}' is not configured")]
    UnknownRepository { name: String },

    #[error("Cannot get an advisory lock on a database, it is locked by another process (mode={mode})")]
    LockBusy { mode: LockMode },

    /// The caller holds no lock, or a weaker one than the operation needs.
    /// Classified with `LockBusy`: either way the required lock is missing.
    #[error("package database lock ({mode}) is not held")]
    LockNotHeld { mode: LockMode },

    #[error("malformed snapshot: {detail}")]
    Parse { detail: String },

    #[error("repository index error: {detail}")]
    Repository { detail: String },

    #[error("corrupt package record {}: {detail}", path.display())]
    CorruptRecord { path: PathBuf, detail: String },

    #[error("cannot satisfy targets: {detail}")]
    UnsatisfiableTargets { detail: String },

    #[error("plan no longer matches the package state: {detail}")]
    ApplyConflict { detail: String },

    #[error("failed to apply plan: {detail}")]
    ApplyFailed { detail: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PkgSnapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::NoDatabase { .. } => ErrorKind::NoDatabase,
            Self::LockBusy { .. } | Self::LockNotHeld { .. } => ErrorKind::LockBusy,
            Self::UnknownRepository { .. }
            | Self::Parse { .. }
            | Self::Repository { .. }
            | Self::CorruptRecord { .. } => ErrorKind::ParseError,
            Self::UnsatisfiableTargets { .. } => ErrorKind::UnsatisfiableTargets,
            Self::ApplyConflict { .. } => ErrorKind::ApplyConflict,
            Self::ApplyFailed { .. } => ErrorKind::ApplyFailed,
            Self::Io { .. } => ErrorKind::IoError,
        }
    }

    pub fn exit_code(&self) -> u8 {
        1
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse {
            detail: detail.into(),
        }
    }

    /// Wraps a repository failure, keeping its full context chain.
    pub fn repository(err: &anyhow::Error) -> Self {
        Self::Repository {
            detail: format!("{err:#}"),
        }
    }

    pub fn unsatisfiable(detail: impl Into<String>) -> Self {
        Self::UnsatisfiableTargets {
            detail: detail.into(),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::ApplyConflict {
            detail: detail.into(),
        }
    }

    pub fn apply_failed(detail: impl Into<String>) -> Self {
        Self::ApplyFailed {
            detail: detail.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
