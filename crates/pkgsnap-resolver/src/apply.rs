use std::fs;
use std::io;
use std::path::Path;

use pkgsnap_core::{PackageManifest, PackageVersion, PkgSnapError};
use pkgsnap_db::DatabaseLayout;
use pkgsnap_security::{sha256_file_hex, verify_sha256_file};
use tracing::debug;

/// Stages the manifest's artifact (if any) into the download cache and
/// copies it into a fresh package directory. Returns the artifact digest.
pub(crate) fn install_payload(
    layout: &DatabaseLayout,
    source_root: Option<&Path>,
    manifest: &PackageManifest,
) -> Result<Option<String>, PkgSnapError> {
    let version = manifest.version.as_str();
    let package_dir = layout.package_dir(&manifest.name, version);
    if package_dir.exists() {
        fs::remove_dir_all(&package_dir).map_err(|err| {
            PkgSnapError::io(
                format!("failed to remove existing package dir: {}", package_dir.display()),
                err,
            )
        })?;
    }
    fs::create_dir_all(&package_dir).map_err(|err| {
        PkgSnapError::io(format!("failed to create {}", package_dir.display()), err)
    })?;

    let Some(artifact) = &manifest.artifact else {
        return Ok(None);
    };
    let id = manifest.id();
    let source_root = source_root.ok_or_else(|| {
        PkgSnapError::apply_failed(format!("no repository root available for '{id}'"))
    })?;
    let file_name = Path::new(&artifact.path).file_name().ok_or_else(|| {
        PkgSnapError::apply_failed(format!("artifact path of '{id}' has no file name"))
    })?;

    let cache_dir = layout.artifact_cache_dir(&manifest.name, version);
    fs::create_dir_all(&cache_dir).map_err(|err| {
        PkgSnapError::io(format!("failed to create {}", cache_dir.display()), err)
    })?;
    let staged = cache_dir.join(file_name);

    let digest = match artifact.sha256.as_deref() {
        Some(expected) if cached_artifact_matches(&staged, expected)? => {
            debug!(target: "pkgsnap::resolver", package = %id, "reusing cached artifact");
            expected.to_ascii_lowercase()
        }
        expected => {
            let source = source_root.join(&artifact.path);
            fs::copy(&source, &staged).map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => PkgSnapError::apply_failed(format!(
                    "artifact for '{id}' is missing: {}",
                    source.display()
                )),
                _ => PkgSnapError::io(format!("failed to stage {}", source.display()), err),
            })?;
            let actual = sha256_file_hex(&staged).map_err(|err| PkgSnapError::Io {
                context: format!("failed to hash staged artifact {}", staged.display()),
                source: io::Error::other(format!("{err:#}")),
            })?;
            if let Some(expected) = expected {
                if !actual.eq_ignore_ascii_case(expected) {
                    let _ = fs::remove_file(&staged);
                    return Err(PkgSnapError::apply_failed(format!(
                        "checksum mismatch for '{id}': expected {expected}, got {actual}"
                    )));
                }
            }
            actual
        }
    };

    let installed = package_dir.join(file_name);
    fs::copy(&staged, &installed).map_err(|err| {
        PkgSnapError::io(format!("failed to install {}", installed.display()), err)
    })?;
    Ok(Some(digest))
}

pub(crate) fn remove_replaced_version(
    layout: &DatabaseLayout,
    name: &str,
    replaced: &PackageVersion,
) -> Result<(), PkgSnapError> {
    let dir = layout.package_dir(name, replaced.as_str());
    match fs::remove_dir_all(&dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(PkgSnapError::io(
                format!("failed to remove replaced package dir: {}", dir.display()),
                err,
            ));
        }
    }
    Ok(())
}

fn cached_artifact_matches(staged: &Path, expected: &str) -> Result<bool, PkgSnapError> {
    if !staged.is_file() {
        return Ok(false);
    }
    verify_sha256_file(staged, expected).map_err(|err| PkgSnapError::Io {
        context: format!("failed to verify cached artifact {}", staged.display()),
        source: io::Error::other(format!("{err:#}")),
    })
}
