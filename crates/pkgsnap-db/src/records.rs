use anyhow::{ensure, Context, Result};
use pkgsnap_core::PackageId;
use serde::{Deserialize, Serialize};

/// One installed package as persisted in `db/records/<name>.record`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub name: String,
    pub version: String,
    /// `name@requirement` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// `name@requirement` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
    #[serde(default)]
    pub install_reason: InstallReason,
    pub installed_at_unix: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    #[default]
    Root,
    Dependency,
}

impl InstallReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Dependency => "dependency",
        }
    }
}

impl InstallRecord {
    pub fn id(&self) -> PackageId {
        PackageId::from_parts(&self.name, &self.version)
    }
}

pub(crate) fn serialize_record(record: &InstallRecord) -> Result<String> {
    toml::to_string(record).with_context(|| format!("failed to encode record for {}", record.name))
}

pub(crate) fn parse_record(raw: &str) -> Result<InstallRecord> {
    let record: InstallRecord = toml::from_str(raw).context("invalid record document")?;
    ensure!(!record.name.is_empty(), "name must not be empty");
    ensure!(!record.version.is_empty(), "version must not be empty");
    Ok(record)
}
