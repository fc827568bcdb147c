use std::collections::BTreeMap;

use pkgsnap_core::PackageManifest;
use semver::VersionReq;

/// A package the caller asked for, with the versions it will accept.
#[derive(Debug, Clone)]
pub struct RootRequirement {
    pub name: String,
    pub requirement: VersionReq,
}

/// Outcome of dependency resolution: one manifest per package name plus an
/// order in which they can be installed.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    pub manifests: BTreeMap<String, PackageManifest>,
    /// Dependencies come before the packages that need them.
    pub install_order: Vec<String>,
}
