use std::fs;
use std::io;
use std::path::Path;

use pkgsnap_core::PkgSnapError;
use serde::Deserialize;

pub(crate) const DEFAULT_MAX_SOLVE_ATTEMPTS: u32 = 5;

/// Settings read from `<root>/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RestoreConfig {
    pub(crate) assume_yes: bool,
    pub(crate) max_solve_attempts: u32,
    pub(crate) default_repository: Option<String>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            assume_yes: false,
            max_solve_attempts: DEFAULT_MAX_SOLVE_ATTEMPTS,
            default_repository: None,
        }
    }
}

impl RestoreConfig {
    /// A missing file yields the defaults.
    pub(crate) fn load(path: &Path) -> Result<Self, PkgSnapError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(PkgSnapError::io(
                    format!("failed to read {}", path.display()),
                    err,
                ));
            }
        };
        Self::parse(&raw)
            .map_err(|detail| PkgSnapError::parse(format!("{}: {detail}", path.display())))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|err| err.to_string())?;
        if config.max_solve_attempts == 0 {
            return Err("max_solve_attempts must be at least 1".to_string());
        }
        Ok(config)
    }
}
