// Canonical JSON (RFC 8785) and SHA-256 digests for ledger attestations

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Canonicalizes a serializable value with JCS and returns the UTF-8 bytes.
///
/// Object keys are sorted and whitespace is removed, so two structurally
/// equal values always hash the same regardless of field order.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let canonical = serde_jcs::to_string(value)?;
    Ok(canonical.into_bytes())
}

/// Computes the SHA-256 hash of the input bytes as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Digest of a ledger history: SHA-256 over its canonical JSON form.
pub fn ledger_digest<T: Serialize>(entries: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&canonical_bytes(entries)?))
}
