// hasher.rs - SHA-256 digests of plan snapshots.
//
// Hex-encoded, lowercase. Plans serialize deterministically (ordered maps,
// ordered dependency list), so equal plans produce equal digests.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::AuditError;

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Digest of a value's canonical JSON form.
pub fn hash_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AuditError> {
    let json = serde_json::to_vec(value)?;
    Ok(hash_bytes(&json))
}
