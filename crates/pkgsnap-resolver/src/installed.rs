use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use pkgsnap_core::{PackageManifest, PackageVersion, PkgSnapError};
use pkgsnap_db::{DatabaseLayout, InstallRecord};
use semver::VersionReq;

/// Installed packages keyed by name, as manifests the resolver can compare.
pub(crate) fn installed_manifests(
    layout: &DatabaseLayout,
    records: &[InstallRecord],
) -> Result<BTreeMap<String, PackageManifest>, PkgSnapError> {
    let mut installed = BTreeMap::new();
    for record in records {
        let manifest =
            record_manifest(record).map_err(|err| PkgSnapError::CorruptRecord {
                path: layout.record_path(&record.name),
                detail: format!("{err:#}"),
            })?;
        installed.insert(record.name.clone(), manifest);
    }
    Ok(installed)
}

fn record_manifest(record: &InstallRecord) -> Result<PackageManifest> {
    Ok(PackageManifest {
        name: record.name.clone(),
        version: PackageVersion::parse(&record.version)?,
        license: None,
        conflicts: parse_requirements(&record.conflicts).context("invalid conflict entry")?,
        dependencies: parse_requirements(&record.dependencies)
            .context("invalid dependency entry")?,
        message: None,
        artifact: None,
    })
}

fn parse_requirements(entries: &[String]) -> Result<BTreeMap<String, VersionReq>> {
    let mut parsed = BTreeMap::new();
    for entry in entries {
        let (name, req) = entry
            .split_once('@')
            .ok_or_else(|| anyhow!("expected name@requirement, found '{entry}'"))?;
        let req = VersionReq::parse(req)
            .with_context(|| format!("invalid version requirement in '{entry}'"))?;
        parsed.insert(name.to_string(), req);
    }
    Ok(parsed)
}

pub(crate) fn format_requirements(requirements: &BTreeMap<String, VersionReq>) -> Vec<String> {
    requirements
        .iter()
        .map(|(name, req)| format!("{name}@{req}"))
        .collect()
}
