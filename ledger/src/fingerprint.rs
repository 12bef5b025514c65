//! Canonical serialization and content fingerprinting.
//!
//! Every place the ledger needs "the bytes of a record" (transaction
//! dedup, block hashing, block signing) goes through this module so
//! that all nodes agree on a single canonical form.
//!
//! The canonical form is JSON with lexicographically sorted object keys:
//! the value is first converted to a [`serde_json::Value`] (whose map is
//! ordered) and then encoded. This makes the fingerprint independent of
//! the field order a peer happened to send, which is what the dedup and
//! chain-continuity checks rely on. `serde_json`'s `preserve_order`
//! feature must stay disabled for this to hold.

use serde::Serialize;

use crate::types::Hash256;

/// Returns the canonical byte representation of any serializable record.
///
/// # Panics
///
/// Panics if the value cannot be represented as JSON. This is considered
/// a programming error, because all ledger types are required to be
/// JSON-serializable.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let json = serde_json::to_value(value)
        .expect("ledger records should always be representable as JSON");
    serde_json::to_vec(&json).expect("JSON value encoding should not fail")
}

/// Computes the canonical BLAKE3-256 fingerprint of a record.
///
/// This must remain stable across nodes: transaction dedup and block
/// hash chaining both compare fingerprints computed on different hosts.
pub fn fingerprint<T: Serialize>(value: &T) -> Hash256 {
    Hash256::compute(&canonical_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Forward {
        alpha: u32,
        beta: String,
    }

    // Same logical record, fields declared in the opposite order.
    #[derive(Serialize)]
    struct Backward {
        beta: String,
        alpha: u32,
    }

    #[test]
    fn fingerprint_is_field_order_independent() {
        let a = Forward {
            alpha: 7,
            beta: "yes".to_string(),
        };
        let b = Backward {
            beta: "yes".to_string(),
            alpha: 7,
        };

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = Forward {
            alpha: 7,
            beta: "yes".to_string(),
        };
        let b = Forward {
            alpha: 8,
            beta: "yes".to_string(),
        };

        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        let a = Forward {
            alpha: 1,
            beta: "x".to_string(),
        };
        assert_eq!(canonical_bytes(&a), canonical_bytes(&a));
    }
}
