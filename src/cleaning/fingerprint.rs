// src/cleaning/fingerprint.rs

//! Deterministic content fingerprints.
//!
//! The digest is computed over a canonical JSON serialization of the sorted
//! significant-field map, so two records with identical fields hash
//! identically regardless of how they were constructed.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::TrackedRecord;

/// Hex SHA-256 digest over the canonical serialization of `fields`.
pub fn content_hash(fields: &BTreeMap<String, Value>) -> String {
    let canonical = serde_json::to_string(fields).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Fingerprint a record's significant fields.
pub fn fingerprint<R: TrackedRecord>(record: &R) -> String {
    content_hash(&record.significant_fields())
}
