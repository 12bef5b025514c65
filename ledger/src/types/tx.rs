//! Vote transaction type.
//!
//! A transaction is a single signed vote: the voter's public key, the
//! vote payload, a detached signature over that payload, and a
//! submission timestamp. Transactions are immutable once admitted to a
//! pool and are only ever removed when a block settles them.

use serde::{Deserialize, Serialize};

use super::{Hash256, PublicKey, Signature};
use crate::fingerprint;
use crate::signer;

/// A signed vote.
///
/// Identity is two-fold: pools key admitted transactions by a local
/// [`TxId`](super::TxId), while *content* identity, which is what dedup
/// and gossip compare, is the [`fingerprint`](Transaction::fingerprint)
/// of the full canonical field set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Voter public key the signature must verify under.
    pub public_key: PublicKey,

    /// The vote payload. Opaque to the ledger; it is only ever hashed
    /// and signature-checked, never interpreted.
    pub vote: String,

    /// Voter signature over the UTF-8 bytes of `vote`.
    pub signature: Signature,

    /// Submission time, in seconds since Unix epoch.
    pub timestamp: u64,
}

impl Transaction {
    /// Canonical content fingerprint over all four fields.
    pub fn fingerprint(&self) -> Hash256 {
        fingerprint::fingerprint(self)
    }

    /// Checks that `signature` verifies over `vote` under `public_key`.
    ///
    /// This is the sole admission gate for transactions; it is run once
    /// on admission and again when a block containing the transaction
    /// is built or validated.
    pub fn verify(&self) -> bool {
        signer::verify(&self.public_key, self.vote.as_bytes(), &self.signature)
    }
}
