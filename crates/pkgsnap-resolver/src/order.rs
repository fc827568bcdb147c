use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use pkgsnap_core::PackageManifest;

/// Kahn's algorithm over the selected set; ties break by name.
pub(crate) fn topo_order(selected: &BTreeMap<String, PackageManifest>) -> Result<Vec<String>> {
    let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (name, manifest) in selected {
        let local_deps = manifest
            .dependencies
            .keys()
            .filter(|dep| selected.contains_key(*dep))
            .collect::<Vec<_>>();
        in_degree.insert(name.as_str(), local_deps.len());
        for dep in local_deps {
            dependents
                .entry(dep.as_str())
                .or_default()
                .insert(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
        .collect();
    let mut ordered = Vec::with_capacity(selected.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        for child in dependents.get(next).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(*child);
                }
            }
        }
    }

    if ordered.len() != selected.len() {
        let cycle_nodes = in_degree
            .iter()
            .filter_map(|(name, degree)| (*degree > 0).then_some(*name))
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "dependency cycle detected involving: {}",
            cycle_nodes.join(", ")
        ));
    }

    Ok(ordered)
}
