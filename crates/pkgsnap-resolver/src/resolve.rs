use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use pkgsnap_core::PackageManifest;
use semver::VersionReq;

use crate::order::topo_order;
use crate::search::SearchState;
use crate::types::{ResolvedGraph, RootRequirement};

pub fn select_highest_compatible<'a>(
    candidates: &'a [PackageManifest],
    requirement: &VersionReq,
) -> Option<&'a PackageManifest> {
    candidates
        .iter()
        .filter(|m| m.version.satisfies(requirement))
        .max_by(|a, b| a.version.cmp(&b.version))
}

/// Picks one version per package reachable from `roots`.
///
/// Already installed versions win whenever they satisfy the constraints, and
/// nothing selected may conflict with an installed package left untouched.
pub fn resolve_dependency_graph_with_installed<F>(
    roots: &[RootRequirement],
    installed: &BTreeMap<String, PackageManifest>,
    load_versions: F,
) -> Result<ResolvedGraph>
where
    F: FnMut(&str) -> Result<Vec<PackageManifest>>,
{
    let mut constraints: BTreeMap<String, Vec<VersionReq>> = BTreeMap::new();
    for root in roots {
        constraints
            .entry(root.name.clone())
            .or_default()
            .push(root.requirement.clone());
    }

    let mut state = SearchState::new(constraints, installed, load_versions);
    if !state.search()? {
        let reason = state
            .last_failure
            .take()
            .unwrap_or_else(|| "constraints are mutually exclusive".to_string());
        return Err(anyhow!("no compatible dependency graph found: {reason}"));
    }

    let install_order = topo_order(&state.selected)?;
    Ok(ResolvedGraph {
        manifests: state.selected,
        install_order,
    })
}
