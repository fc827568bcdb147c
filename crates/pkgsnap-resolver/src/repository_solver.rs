use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use pkgsnap_core::{LockMode, PackageManifest, PackageVersion, PkgSnapError};
use pkgsnap_db::{DbLock, InstallReason, InstallRecord, PackageDb};
use pkgsnap_registry::ConfiguredRegistryIndex;
use tracing::{debug, info};

use crate::apply::{install_payload, remove_replaced_version};
use crate::installed::{format_requirements, installed_manifests};
use crate::{
    resolve_dependency_graph_with_installed, ActionKind, ApplyReport, JobSet, Plan,
    PlannedAction, RootRequirement, Solver,
};

/// Solver backed by the configured local repositories.
#[derive(Debug)]
pub struct RepositorySolver {
    index: ConfiguredRegistryIndex,
}

struct RepositoryPackages {
    by_name: BTreeMap<String, (String, Vec<PackageManifest>)>,
}

impl RepositorySolver {
    pub fn new(index: ConfiguredRegistryIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &ConfiguredRegistryIndex {
        &self.index
    }

    fn load_packages(&self) -> Result<RepositoryPackages, PkgSnapError> {
        let mut by_name = BTreeMap::new();
        let names = self
            .index
            .package_names()
            .map_err(|err| PkgSnapError::repository(&err))?;
        for name in names {
            if let Some(found) = self
                .index
                .package_versions_with_source(&name)
                .map_err(|err| PkgSnapError::repository(&err))?
            {
                by_name.insert(name, found);
            }
        }
        Ok(RepositoryPackages { by_name })
    }
}

impl Solver for RepositorySolver {
    fn solve(
        &mut self,
        db: &PackageDb,
        lock: &DbLock<'_>,
        jobs: &JobSet,
    ) -> Result<Plan, PkgSnapError> {
        let base_generation = db.generation(lock)?;
        let records = db.query_installed(lock)?;
        let installed = installed_manifests(db.layout(), &records)?;
        let repository = self.load_packages()?;
        let version_test = jobs.flags().version_test;

        let mut requested: BTreeMap<String, PackageVersion> = BTreeMap::new();
        let mut checked: BTreeSet<String> = BTreeSet::new();
        let mut unmatched = Vec::new();
        for target in jobs.targets() {
            let mut matched = false;
            for (name, (_, versions)) in &repository.by_name {
                let Some(best) = versions
                    .iter()
                    .filter(|manifest| target.matches(&manifest.name, manifest.version.as_str()))
                    .max_by(|a, b| a.version.cmp(&b.version))
                else {
                    continue;
                };
                matched = true;
                checked.insert(name.clone());
                if target_satisfied(installed.get(name), &best.version, version_test) {
                    continue;
                }
                requested
                    .entry(name.clone())
                    .and_modify(|version| {
                        if best.version > *version {
                            *version = best.version.clone();
                        }
                    })
                    .or_insert_with(|| best.version.clone());
            }

            if !matched {
                for manifest in installed.values() {
                    if target.matches(&manifest.name, manifest.version.as_str()) {
                        matched = true;
                        checked.insert(manifest.name.clone());
                    }
                }
            }
            if !matched {
                unmatched.push(target.as_str().to_string());
            }
        }

        if !unmatched.is_empty() {
            return Err(PkgSnapError::unsatisfiable(format!(
                "no package matches {}",
                unmatched.join(", ")
            )));
        }

        if requested.is_empty() {
            debug!(target: "pkgsnap::resolver", checked = checked.len(), "all targets satisfied");
            return Ok(Plan {
                actions: Vec::new(),
                checked: checked.len(),
                base_generation,
            });
        }

        let roots = requested
            .iter()
            .map(|(name, version)| RootRequirement {
                name: name.clone(),
                requirement: version.exact_requirement(),
            })
            .collect::<Vec<_>>();
        let graph = resolve_dependency_graph_with_installed(&roots, &installed, |name| {
            let mut versions = repository
                .by_name
                .get(name)
                .map(|(_, versions)| versions.clone())
                .unwrap_or_default();
            if let Some(current) = installed.get(name) {
                if !versions.iter().any(|manifest| manifest.version == current.version) {
                    versions.push(current.clone());
                }
            }
            Ok(versions)
        })
        .map_err(|err| PkgSnapError::unsatisfiable(format!("{err:#}")))?;

        let reasons: BTreeMap<&str, InstallReason> = records
            .iter()
            .map(|record| (record.name.as_str(), record.install_reason))
            .collect();
        let mut actions = Vec::new();
        for name in &graph.install_order {
            checked.insert(name.clone());
            let Some(manifest) = graph.manifests.get(name) else {
                continue;
            };
            let kind = match installed.get(name) {
                Some(current) if current.version == manifest.version => continue,
                Some(current) if manifest.version > current.version => ActionKind::Upgrade {
                    from: current.version.clone(),
                },
                Some(current) => ActionKind::Downgrade {
                    from: current.version.clone(),
                },
                None => ActionKind::Install,
            };
            let Some((source, _)) = repository.by_name.get(name) else {
                return Err(PkgSnapError::unsatisfiable(format!(
                    "'{}' is not available from any repository",
                    manifest.id()
                )));
            };
            let reason = if requested.contains_key(name)
                || reasons.get(name.as_str()) == Some(&InstallReason::Root)
            {
                InstallReason::Root
            } else {
                InstallReason::Dependency
            };
            actions.push(PlannedAction {
                kind,
                manifest: manifest.clone(),
                source: source.clone(),
                reason,
            });
        }

        debug!(
            target: "pkgsnap::resolver",
            actions = actions.len(),
            checked = checked.len(),
            generation = base_generation,
            "computed plan"
        );
        Ok(Plan {
            actions,
            checked: checked.len(),
            base_generation,
        })
    }

    fn apply(
        &mut self,
        db: &PackageDb,
        lock: &DbLock<'_>,
        plan: &Plan,
    ) -> Result<ApplyReport, PkgSnapError> {
        if lock.mode() != LockMode::Exclusive {
            return Err(PkgSnapError::LockNotHeld {
                mode: LockMode::Exclusive,
            });
        }

        let generation = db.generation(lock)?;
        if generation != plan.base_generation {
            return Err(PkgSnapError::conflict(format!(
                "package database changed since the plan was computed (generation {} -> {generation})",
                plan.base_generation
            )));
        }
        for action in &plan.actions {
            let current = self
                .index
                .manifest(
                    &action.source,
                    &action.manifest.name,
                    action.manifest.version.as_str(),
                )
                .map_err(|err| PkgSnapError::repository(&err))?;
            if current.as_ref() != Some(&action.manifest) {
                return Err(PkgSnapError::conflict(format!(
                    "'{}' changed in repository '{}'",
                    action.id(),
                    action.source
                )));
            }
        }

        let mut report = ApplyReport::default();
        for action in &plan.actions {
            let manifest = &action.manifest;
            let artifact_sha256 = install_payload(
                db.layout(),
                self.index.source_root(&action.source),
                manifest,
            )?;
            let record = InstallRecord {
                name: manifest.name.clone(),
                version: manifest.version.as_str().to_string(),
                dependencies: format_requirements(&manifest.dependencies),
                conflicts: format_requirements(&manifest.conflicts),
                source: Some(action.source.clone()),
                artifact_sha256,
                install_reason: action.reason,
                installed_at_unix: current_unix_timestamp(),
            };
            db.record_install(lock, &record)?;
            if let Some(replaced) = action.kind.replaced_version() {
                remove_replaced_version(db.layout(), &manifest.name, replaced)?;
            }

            info!(target: "pkgsnap::resolver", action = %action, "applied");
            report.installed.push(action.id());
            if let Some(message) = &manifest.message {
                report.messages.push(message.trim_end().to_string());
            }
        }
        Ok(report)
    }
}

fn target_satisfied(
    installed: Option<&PackageManifest>,
    requested: &PackageVersion,
    version_test: bool,
) -> bool {
    match installed {
        Some(current) if version_test => current.version >= *requested,
        Some(current) => current.version == *requested,
        None => false,
    }
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
