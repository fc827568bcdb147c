use std::cell::Cell;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pkgsnap_core::{PackageManifest, PkgSnapError};
use pkgsnap_security::TrustedKey;
use tracing::{debug, warn};

use crate::RegistrySourceStore;

/// A repository laid out as `index/<name>/<version>.toml`.
///
/// When the root holds `registry.pub`, each manifest needs a detached
/// `<version>.toml.sig` signed by that key.
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    root: PathBuf,
    warned_unsigned: Cell<bool>,
}

/// Every repository a restore may pull from, in lookup order.
#[derive(Debug, Clone)]
pub struct ConfiguredRegistryIndex {
    sources: Vec<ConfiguredSource>,
}

#[derive(Debug, Clone)]
struct ConfiguredSource {
    name: String,
    index: RegistryIndex,
}

impl RegistryIndex {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            warned_unsigned: Cell::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names with at least one manifest, sorted.
    pub fn package_names(&self) -> Result<Vec<String>> {
        let index_root = self.root.join("index");
        let entries = match fs::read_dir(&index_root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read registry index: {}", index_root.display())
                });
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read registry index entry")?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if has_manifest_files(&entry.path())? {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Manifests of `package`, newest first.
    pub fn package_versions(&self, package: &str) -> Result<Vec<PackageManifest>> {
        let package_dir = self.root.join("index").join(package);
        if !package_dir.is_dir() {
            return Ok(Vec::new());
        }

        let trusted_key = self.trusted_key()?;
        let mut manifests = Vec::new();
        for path in manifest_files(&package_dir)? {
            let manifest_bytes = fs::read(&path)
                .with_context(|| format!("failed reading manifest: {}", path.display()))?;
            if let Some(key) = &trusted_key {
                verify_manifest_signature(key, &path, &manifest_bytes)?;
            }

            let content = String::from_utf8(manifest_bytes)
                .with_context(|| format!("manifest is not valid UTF-8: {}", path.display()))?;
            let manifest = PackageManifest::from_toml_str(&content)
                .with_context(|| format!("failed parsing manifest: {}", path.display()))?;
            if manifest.name != package {
                anyhow::bail!(
                    "manifest {} declares package '{}' but is filed under '{package}'",
                    path.display(),
                    manifest.name
                );
            }
            manifests.push(manifest);
        }

        manifests.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(manifests)
    }

    pub fn manifest(&self, package: &str, version: &str) -> Result<Option<PackageManifest>> {
        Ok(self
            .package_versions(package)?
            .into_iter()
            .find(|manifest| manifest.version.as_str() == version))
    }

    fn trusted_key(&self) -> Result<Option<TrustedKey>> {
        let key_path = self.root.join("registry.pub");
        match fs::read_to_string(&key_path) {
            Ok(raw) => TrustedKey::from_hex(&raw)
                .with_context(|| format!("invalid trusted registry key: {}", key_path.display()))
                .map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if self.warned_unsigned.replace(true) {
                    return Ok(None);
                }
                warn!(
                    target: "pkgsnap::registry",
                    root = %self.root.display(),
                    "repository has no registry.pub; accepting unsigned manifests"
                );
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| {
                format!("failed to read trusted registry key: {}", key_path.display())
            }),
        }
    }
}

impl ConfiguredRegistryIndex {
    /// Loads the enabled sources of `<repos_dir>/sources.toml`. With `only`,
    /// resolution is restricted to that source, which must be configured.
    pub fn open(repos_dir: impl AsRef<Path>, only: Option<&str>) -> Result<Self, PkgSnapError> {
        let store = RegistrySourceStore::new(repos_dir.as_ref());
        let records = store
            .list_sources()
            .map_err(|err| PkgSnapError::repository(&err))?;

        let selected = match only {
            Some(name) => {
                let record = records
                    .into_iter()
                    .find(|record| record.name == name)
                    .ok_or_else(|| PkgSnapError::UnknownRepository {
                        name: name.to_string(),
                    })?;
                if !record.enabled {
                    debug!(target: "pkgsnap::registry", source = name, "using disabled source on request");
                }
                vec![record]
            }
            None => records.into_iter().filter(|record| record.enabled).collect(),
        };

        let sources = selected
            .into_iter()
            .map(|record| ConfiguredSource {
                index: RegistryIndex::open(store.resolve_location(&record)),
                name: record.name,
            })
            .collect::<Vec<_>>();
        debug!(target: "pkgsnap::registry", sources = sources.len(), "loaded repository sources");
        Ok(Self { sources })
    }

    /// A single repository root used directly, without `sources.toml`.
    pub fn single(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            sources: vec![ConfiguredSource {
                name: name.into(),
                index: RegistryIndex::open(root),
            }],
        }
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_root(&self, source: &str) -> Option<&Path> {
        self.find_source(source).map(|source| source.index.root())
    }

    /// Union of package names across all sources, sorted.
    pub fn package_names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for source in &self.sources {
            let found = source.index.package_names().with_context(|| {
                format!("failed listing packages of source '{}'", source.name)
            })?;
            names.extend(found);
        }
        Ok(names.into_iter().collect())
    }

    /// Versions from the first source, in priority order, that has any.
    pub fn package_versions_with_source(
        &self,
        package: &str,
    ) -> Result<Option<(String, Vec<PackageManifest>)>> {
        for source in &self.sources {
            let manifests = source.index.package_versions(package).with_context(|| {
                format!(
                    "failed loading package '{package}' from source '{}'",
                    source.name
                )
            })?;
            if !manifests.is_empty() {
                return Ok(Some((source.name.clone(), manifests)));
            }
        }
        Ok(None)
    }

    /// Re-reads one manifest from `source`. `None` if the source, package,
    /// or version is gone.
    pub fn manifest(
        &self,
        source: &str,
        package: &str,
        version: &str,
    ) -> Result<Option<PackageManifest>> {
        match self.find_source(source) {
            Some(configured) => configured.index.manifest(package, version).with_context(|| {
                format!("failed reloading '{package}-{version}' from source '{source}'")
            }),
            None => Ok(None),
        }
    }

    fn find_source(&self, name: &str) -> Option<&ConfiguredSource> {
        self.sources.iter().find(|source| source.name == name)
    }
}

fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read package directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) == Some("toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_manifest_files(dir: &Path) -> Result<bool> {
    Ok(!manifest_files(dir)?.is_empty())
}

fn verify_manifest_signature(key: &TrustedKey, path: &Path, manifest_bytes: &[u8]) -> Result<()> {
    let signature_path = path.with_extension("toml.sig");
    let signature_hex = fs::read_to_string(&signature_path).with_context(|| {
        format!(
            "failed reading manifest signature for key {}: {}",
            key.key_id(),
            signature_path.display()
        )
    })?;

    let valid = key
        .verify_hex(manifest_bytes, &signature_hex)
        .with_context(|| {
            format!(
                "failed verifying manifest signature for key {}: {}",
                key.key_id(),
                signature_path.display()
            )
        })?;
    if !valid {
        anyhow::bail!(
            "invalid manifest signature for key {}: manifest {}, signature {}",
            key.key_id(),
            path.display(),
            signature_path.display()
        );
    }
    Ok(())
}
