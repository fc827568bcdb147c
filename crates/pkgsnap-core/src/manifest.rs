use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use semver::VersionReq;
use serde::{Deserialize, Serialize};

use crate::{PackageId, PackageVersion};

/// A package as published by a repository index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    pub version: PackageVersion,
    pub license: Option<String>,
    #[serde(default)]
    pub conflicts: BTreeMap<String, VersionReq>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,
    /// Shown to the user after the package is installed.
    pub message: Option<String>,
    pub artifact: Option<ManifestArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestArtifact {
    /// Path relative to the repository root.
    pub path: String,
    pub sha256: Option<String>,
}

impl PackageManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse package manifest")?;
        if manifest.name.trim().is_empty() {
            return Err(anyhow!("manifest name must not be empty"));
        }
        if manifest.conflicts.contains_key(&manifest.name) {
            return Err(anyhow!(
                "manifest '{}' conflicts with itself",
                manifest.name
            ));
        }
        if manifest.dependencies.contains_key(&manifest.name) {
            return Err(anyhow!("manifest '{}' depends on itself", manifest.name));
        }
        if let Some(artifact) = &manifest.artifact {
            validate_artifact_path(&artifact.path).with_context(|| {
                format!(
                    "invalid artifact path for '{}-{}'",
                    manifest.name, manifest.version
                )
            })?;
        }
        Ok(manifest)
    }

    pub fn id(&self) -> PackageId {
        PackageId::from_parts(&self.name, self.version.as_str())
    }

    pub fn conflicts_with(&self, other: &PackageManifest) -> bool {
        self.conflicts
            .get(&other.name)
            .is_some_and(|req| other.version.satisfies(req))
            || other
                .conflicts
                .get(&self.name)
                .is_some_and(|req| self.version.satisfies(req))
    }
}

fn validate_artifact_path(path: &str) -> anyhow::Result<()> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("artifact path must not be empty"));
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(anyhow!("artifact path must be relative: {path}"));
    }
    if trimmed
        .split(['/', '\\'])
        .any(|component| component == "..")
    {
        return Err(anyhow!(
            "artifact path must not escape the repository: {path}"
        ));
    }
    Ok(())
}
