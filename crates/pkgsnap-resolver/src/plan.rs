use std::fmt;

use pkgsnap_core::{PackageId, PackageManifest, PackageVersion};
use pkgsnap_db::InstallReason;
use pkgsnap_security::sha256_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Install,
    Upgrade { from: PackageVersion },
    Downgrade { from: PackageVersion },
}

impl ActionKind {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Install => "Installing",
            Self::Upgrade { .. } => "Upgrading",
            Self::Downgrade { .. } => "Downgrading",
        }
    }

    pub fn replaced_version(&self) -> Option<&PackageVersion> {
        match self {
            Self::Install => None,
            Self::Upgrade { from } | Self::Downgrade { from } => Some(from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub kind: ActionKind,
    pub manifest: PackageManifest,
    /// Repository the manifest was loaded from.
    pub source: String,
    pub reason: InstallReason,
}

impl PlannedAction {
    pub fn id(&self) -> PackageId {
        self.manifest.id()
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.replaced_version() {
            Some(from) => write!(
                f,
                "{} {}: {} -> {}",
                self.kind.verb(),
                self.manifest.name,
                from,
                self.manifest.version
            ),
            None => write!(f, "{} {}", self.kind.verb(), self.manifest.id()),
        }
    }
}

/// Ordered change-set computed against one database generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    /// Packages examined while solving, changed or not.
    pub checked: usize,
    pub base_generation: u64,
}

impl Plan {
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Identity of the proposed changes, independent of the generation it
    /// was computed against.
    ///
    /// Every manifest field takes part, so two plans share a fingerprint only
    /// when applying either would write the same records.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        for action in &self.actions {
            let from = action
                .kind
                .replaced_version()
                .map(PackageVersion::as_str)
                .unwrap_or("-");
            canonical.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                action.kind.verb(),
                from,
                action.source,
                action.reason.as_str()
            ));
            push_manifest_lines(&mut canonical, &action.manifest);
        }
        sha256_hex(canonical.as_bytes())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub installed: Vec<PackageId>,
    /// Post-install messages in apply order.
    pub messages: Vec<String>,
}

fn push_manifest_lines(canonical: &mut String, manifest: &PackageManifest) {
    canonical.push_str(&format!(
        "manifest\t{}\t{}\t{:?}\t{:?}\n",
        manifest.name,
        manifest.version.as_str(),
        manifest.license,
        manifest.message
    ));
    for (name, req) in &manifest.dependencies {
        canonical.push_str(&format!("depends\t{name}\t{req}\n"));
    }
    for (name, req) in &manifest.conflicts {
        canonical.push_str(&format!("conflicts\t{name}\t{req}\n"));
    }
    if let Some(artifact) = &manifest.artifact {
        canonical.push_str(&format!(
            "artifact\t{}\t{}\n",
            artifact.path,
            artifact.sha256.as_deref().unwrap_or("-")
        ));
    }
}
