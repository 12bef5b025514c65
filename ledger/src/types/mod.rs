//! Core domain types used by the ledger.
//!
//! This module defines strongly-typed hashes, key and signature wrappers,
//! transaction identifiers, and peer addresses shared across the ledger
//! implementation. The goal is to avoid "naked" byte buffers and strings
//! in public APIs and instead use domain-specific newtypes.
//!
//! All byte-valued types (hashes, keys, signatures) serialize as
//! hex-encoded strings, which is the wire representation used in chain
//! dumps and peer messages.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::de::Error as _;

/// Block types and hashing.
pub mod block;
/// Vote transaction type.
pub mod tx;

pub use block::Block;
pub use tx::Transaction;

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit content hash (BLAKE3-256).
///
/// Backing representation for block hashes and transaction fingerprints.
/// Always exactly [`HASH_LEN`] bytes; serialized as a 64-character hex
/// string on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// Deterministic for a given byte slice; suitable as a content hash
    /// or identifier, but **not** a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// The all-zero hash, used as the `previous_hash` of the genesis block.
    pub const fn zero() -> Self {
        Hash256([0u8; HASH_LEN])
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let arr: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("hash must be exactly 32 bytes"))?;
        Ok(Hash256(arr))
    }
}

/// Voter or authority public key bytes, wrapped to avoid naked `Vec<u8>`.
///
/// This type is intentionally opaque: it does not interpret or validate
/// the key material, it only carries it through the API in a structured
/// way. The encoding is scheme-specific (Ed25519 in the default stack).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    /// Returns the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Detached signature bytes over a canonical message encoding.
///
/// Produced either by a voter key (over the vote payload) or by the
/// chain authority key (over a block header).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

macro_rules! hex_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(&self.0))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                hex::decode(&s).map($ty).map_err(D::Error::custom)
            }
        }
    };
}

hex_serde!(PublicKey);
hex_serde!(Signature);

/// Pool-local transaction identifier: `(node id, local sequence number)`.
///
/// Rendered as `"<node_id>-<seq>"`, which is also the map key used for
/// transactions inside a block. Content identity is handled separately
/// via fingerprints; this identifier only names a pool slot.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    /// Builds a transaction id from a node identifier and sequence number.
    pub fn new(node_id: &str, seq: u64) -> Self {
        TxId(format!("{node_id}-{seq}"))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP-addressable peer identity, e.g. `"http://127.0.0.1:7001"`.
///
/// Peer addresses double as acknowledgement identities in the quorum
/// buffer, so two peers must never share an address.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddr(pub String);

impl PeerAddr {
    /// Returns the address with any trailing slash removed.
    pub fn normalized(&self) -> PeerAddr {
        PeerAddr(self.0.trim_end_matches('/').to_string())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
