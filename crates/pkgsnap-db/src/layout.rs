use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Paths of everything pkgsnap keeps under one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseLayout {
    root: PathBuf,
}

impl DatabaseLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.db_dir().join("records")
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.records_dir().join(format!("{name}.record"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.db_dir().join("lock")
    }

    pub fn generation_path(&self) -> PathBuf {
        self.db_dir().join("generation")
    }

    pub fn pkgs_dir(&self) -> PathBuf {
        self.root.join("pkgs")
    }

    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.pkgs_dir().join(name).join(version)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn artifacts_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("artifacts")
    }

    pub fn artifact_cache_dir(&self, name: &str, version: &str) -> PathBuf {
        self.artifacts_cache_dir().join(name).join(version)
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.join("repos")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

pub fn default_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve the pkgsnap root")?;
        return Ok(PathBuf::from(app_data).join("pkgsnap"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve the pkgsnap root")?;
    Ok(PathBuf::from(home).join(".pkgsnap"))
}
