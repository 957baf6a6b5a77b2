//! Content digesting for the deduplicator (spec §4.5) and the harvester's
//! upsert-if-changed check (spec §4.7): both need a stable content hash of
//! a normalized record's canonical JSON form.

use sha2::{Digest, Sha224};

/// SHA-224 hex digest of a value's canonical (key-sorted) JSON
/// serialization. `serde_json::Value`'s `Map` is a `BTreeMap` by default,
/// so `to_string` already produces a stable key order.
pub fn digest_value(value: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(value).expect("Value always serializes");
    digest_bytes(canonical.as_bytes())
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha224::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_same_digest() {
        let a = json!({"type": "METAR", "unique_name": "KIND"});
        let b = json!({"unique_name": "KIND", "type": "METAR"});
        assert_eq!(digest_value(&a), digest_value(&b));
    }

    #[test]
    fn different_value_different_digest() {
        let a = json!({"type": "METAR"});
        let b = json!({"type": "TAF"});
        assert_ne!(digest_value(&a), digest_value(&b));
    }
}
