use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use pkgsnap_core::PackageManifest;
use semver::VersionReq;

use crate::constraints::selected_satisfies_constraints;

pub(crate) struct SearchState<'a, F> {
    pub(crate) constraints: BTreeMap<String, Vec<VersionReq>>,
    pub(crate) selected: BTreeMap<String, PackageManifest>,
    pub(crate) installed: &'a BTreeMap<String, PackageManifest>,
    /// Most recent dead end, reported when the whole search fails.
    pub(crate) last_failure: Option<String>,
    versions_cache: HashMap<String, Vec<PackageManifest>>,
    load_versions: F,
}

impl<'a, F> SearchState<'a, F>
where
    F: FnMut(&str) -> Result<Vec<PackageManifest>>,
{
    pub(crate) fn new(
        constraints: BTreeMap<String, Vec<VersionReq>>,
        installed: &'a BTreeMap<String, PackageManifest>,
        load_versions: F,
    ) -> Self {
        Self {
            constraints,
            selected: BTreeMap::new(),
            installed,
            last_failure: None,
            versions_cache: HashMap::new(),
            load_versions,
        }
    }

    /// Depth-first search with backtracking; `Ok(false)` when no assignment
    /// satisfies every constraint.
    pub(crate) fn search(&mut self) -> Result<bool> {
        let Some(next) = self
            .constraints
            .keys()
            .find(|name| !self.selected.contains_key(*name))
            .cloned()
        else {
            return Ok(selected_satisfies_constraints(
                &self.selected,
                &self.constraints,
                self.installed,
            ));
        };

        for candidate in self.matching_candidates(&next)? {
            let mut added_constraints: Vec<(String, usize)> = Vec::new();
            for (dep_name, dep_req) in &candidate.dependencies {
                let list = self.constraints.entry(dep_name.clone()).or_default();
                list.push(dep_req.clone());
                added_constraints.push((dep_name.clone(), list.len()));
            }
            let candidate_version = candidate.version.to_string();
            self.selected.insert(next.clone(), candidate);

            let consistent =
                selected_satisfies_constraints(&self.selected, &self.constraints, self.installed);
            if consistent && self.search()? {
                return Ok(true);
            }
            if !consistent {
                self.last_failure = Some(format!(
                    "'{next}-{candidate_version}' conflicts with the selected or installed packages"
                ));
            }

            for (dep_name, old_len) in added_constraints {
                if let Some(list) = self.constraints.get_mut(&dep_name) {
                    list.truncate(old_len.saturating_sub(1));
                }
            }
            self.constraints.retain(|_, reqs| !reqs.is_empty());
            self.selected.remove(&next);
        }

        Ok(false)
    }

    /// Candidates for `name` that satisfy every current constraint. The
    /// installed version goes first, then newest to oldest. An empty list
    /// makes the caller backtrack.
    fn matching_candidates(&mut self, name: &str) -> Result<Vec<PackageManifest>> {
        if !self.versions_cache.contains_key(name) {
            let versions = (self.load_versions)(name)?;
            self.versions_cache.insert(name.to_string(), versions);
        }

        let versions = self
            .versions_cache
            .get(name)
            .ok_or_else(|| anyhow!("internal resolver cache error for package '{name}'"))?;
        if versions.is_empty() {
            return Err(anyhow!("package '{name}' was not found in any repository"));
        }

        let package_reqs = self.constraints.get(name).cloned().unwrap_or_default();
        let installed_version = self.installed.get(name).map(|manifest| &manifest.version);
        let mut matched: Vec<PackageManifest> = versions
            .iter()
            .filter(|manifest| manifest.name == name)
            .filter(|manifest| package_reqs.iter().all(|req| manifest.version.satisfies(req)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let a_installed = Some(&a.version) == installed_version;
            let b_installed = Some(&b.version) == installed_version;
            b_installed
                .cmp(&a_installed)
                .then_with(|| b.version.cmp(&a.version))
        });

        if matched.is_empty() {
            let req_desc = if package_reqs.is_empty() {
                "*".to_string()
            } else {
                package_reqs
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" && ")
            };
            self.last_failure = Some(format!(
                "no matching version for '{name}' with constraints [{req_desc}]"
            ));
        }

        Ok(matched)
    }
}
