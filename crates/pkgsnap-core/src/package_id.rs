use std::fmt;

use serde::{Deserialize, Serialize};

/// A `<name>-<version>` token as written to and read from a snapshot.
///
/// The token is kept verbatim; `name()` and `version()` are best-effort views
/// that split on the last `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_parts(name: &str, version: &str) -> Self {
        Self(format!("{name}-{version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.split().map(|(name, _)| name).unwrap_or(&self.0)
    }

    pub fn version(&self) -> Option<&str> {
        self.split().map(|(_, version)| version)
    }

    fn split(&self) -> Option<(&str, &str)> {
        self.0
            .rsplit_once('-')
            .filter(|(name, version)| !name.is_empty() && !version.is_empty())
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
