mod error;
mod lock;
mod manifest;
mod package_id;
mod snapshot;
mod version;

pub use error::{ErrorKind, PkgSnapError};
pub use lock::LockMode;
pub use manifest::{ManifestArtifact, PackageManifest};
pub use package_id::PackageId;
pub use snapshot::{parse_snapshot, write_snapshot, Snapshot};
pub use version::PackageVersion;
