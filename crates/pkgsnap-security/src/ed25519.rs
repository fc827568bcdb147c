use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Repository trust anchor loaded from a hex-encoded Ed25519 public key.
#[derive(Debug, Clone)]
pub struct TrustedKey {
    key: VerifyingKey,
    key_id: String,
}

impl TrustedKey {
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let trimmed = public_key_hex.trim();
        let bytes: [u8; 32] = decode_fixed(trimmed, "public key")?;
        let key = VerifyingKey::from_bytes(&bytes).context("invalid Ed25519 public key bytes")?;
        Ok(Self {
            key,
            key_id: trimmed.chars().take(16).collect(),
        })
    }

    /// Short prefix of the key used in diagnostics.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// `Ok(false)` means well-formed but not signed by this key.
    pub fn verify_hex(&self, payload: &[u8], signature_hex: &str) -> Result<bool> {
        let bytes: [u8; 64] = decode_fixed(signature_hex.trim(), "signature")?;
        let signature = Signature::from_bytes(&bytes);
        Ok(self.key.verify(payload, &signature).is_ok())
    }
}

fn decode_fixed<const N: usize>(value: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value).with_context(|| format!("failed to decode Ed25519 {what} hex"))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow!("invalid Ed25519 {what} length: expected {N} bytes, got {len}"))
}
