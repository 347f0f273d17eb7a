//! Idempotency key helpers.
//!
//! Task updates carry an `Idempotency-Key` derived from the request, so a
//! retried move with the same target window is recognised by the backend.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::SyncError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub fn idempotency_key(
    operation: &str,
    request_scope: &str,
    body: &impl Serialize,
) -> Result<String, SyncError> {
    // Canonicalize JSON so map key ordering doesn't affect the derived key.
    let json_value = serde_json::to_value(body)?;
    let body_json = serde_json::to_vec(&json_value)?;

    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b"\n");
    hasher.update(request_scope.as_bytes());
    hasher.update(b"\n");
    hasher.update(&body_json);

    Ok(format!("as_{:x}", hasher.finalize()))
}
