use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Streams `path` through sha256 and returns the lowercase hex digest.
pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares the streamed digest of `path` against `expected_hex`
/// (case-insensitive).
pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = sha256_file_hex(path)?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hashes_empty_input() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
    }

    #[test]
    fn streams_files_larger_than_one_buffer() {
        let path = std::env::temp_dir().join(format!(
            "pkgsnap-security-large-{}.bin",
            std::process::id()
        ));
        let payload = vec![7_u8; 64 * 1024 * 3 + 17];
        std::fs::write(&path, &payload).expect("must write file");

        assert_eq!(
            sha256_file_hex(&path).expect("must hash file"),
            sha256_hex(&payload)
        );
        assert!(sha256_file_hex(&path.with_extension("missing")).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn verifies_file_digest_case_insensitively() {
        let path = std::env::temp_dir().join(format!(
            "pkgsnap-security-checksum-{}.bin",
            std::process::id()
        ));
        std::fs::write(&path, b"").expect("must write file");

        assert!(verify_sha256_file(&path, &EMPTY_SHA256.to_ascii_uppercase())
            .expect("must hash file"));
        assert!(!verify_sha256_file(&path, "00").expect("must hash file"));
        assert_eq!(sha256_file_hex(&path).expect("must hash file"), EMPTY_SHA256);

        let _ = std::fs::remove_file(&path);
    }
}
