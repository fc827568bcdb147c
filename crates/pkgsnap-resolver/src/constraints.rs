use std::collections::BTreeMap;

use pkgsnap_core::PackageManifest;
use semver::VersionReq;

/// True when every chosen version meets all requirements collected for its
/// name and no two packages that would end up installed conflict.
///
/// Installed packages absent from `selected` stay as they are, so they take
/// part in the conflict check as well.
pub(crate) fn selected_satisfies_constraints(
    selected: &BTreeMap<String, PackageManifest>,
    constraints: &BTreeMap<String, Vec<VersionReq>>,
    installed: &BTreeMap<String, PackageManifest>,
) -> bool {
    let requirements_met = selected.iter().all(|(name, manifest)| {
        constraints
            .get(name)
            .map_or(true, |reqs| reqs.iter().all(|req| manifest.version.satisfies(req)))
    });
    if !requirements_met {
        return false;
    }

    let chosen: Vec<&PackageManifest> = selected.values().collect();
    let kept = installed
        .iter()
        .filter(|(name, _)| !selected.contains_key(*name))
        .map(|(_, manifest)| manifest);

    let pairwise_clean = chosen.iter().enumerate().all(|(index, left)| {
        chosen[index + 1..]
            .iter()
            .all(|right| !left.conflicts_with(right))
    });
    pairwise_clean
        && kept
            .into_iter()
            .all(|held| chosen.iter().all(|manifest| !manifest.conflicts_with(held)))
}
