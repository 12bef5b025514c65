//! Block types and hashing.
//!
//! A block bundles a map of settled transactions with the chain-linking
//! fields and an authority signature (the *proof of verification*) over
//! the header. Two canonical encodings matter here and both go through
//! [`crate::fingerprint`]:
//!
//! - the **signing view**, `{index, transactions, timestamp,
//!   previous_hash}`, is what the authority signs;
//! - the **hash view** (every field except `hash` itself) is what the
//!   block hash commits to, so the proof is chained along with the
//!   content.
//!
//! Blocks are immutable once constructed; a candidate that fails
//! validation is discarded, never repaired.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Hash256, Signature, Transaction, TxId};
use crate::fingerprint;

/// A committed or candidate block.
///
/// `transactions` is an ordered map so its canonical encoding does not
/// depend on the insertion order of pool entries on the proposing node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// 0-based height of this block.
    pub index: u64,

    /// Transactions settled by this block, keyed by pool id.
    pub transactions: BTreeMap<TxId, Transaction>,

    /// Authority signature over the signing view of the header.
    ///
    /// Present on every block including genesis; for genesis it is
    /// checked at creation time but not relied upon when a bootstrapping
    /// node replays a dump (continuity from block 1 onward is the basis
    /// of trust there).
    pub proof_of_verification: Signature,

    /// Block construction time, in seconds since Unix epoch.
    pub timestamp: u64,

    /// Hash of the block at `index - 1`; all zeros for genesis.
    pub previous_hash: Hash256,

    /// Content hash over every other field, including the proof.
    pub hash: Hash256,
}

/// Borrowed signing view of a block header.
///
/// Field set and serialization must stay in lockstep with
/// [`Block::signing_bytes`] on every node, or proofs stop verifying.
#[derive(Serialize)]
struct SigningView<'a> {
    index: u64,
    transactions: &'a BTreeMap<TxId, Transaction>,
    timestamp: u64,
    previous_hash: &'a Hash256,
}

/// Borrowed hash view: all fields except `hash`.
#[derive(Serialize)]
struct HashView<'a> {
    index: u64,
    transactions: &'a BTreeMap<TxId, Transaction>,
    proof_of_verification: &'a Signature,
    timestamp: u64,
    previous_hash: &'a Hash256,
}

impl Block {
    /// Canonical bytes the authority signs over.
    pub fn signing_bytes(&self) -> Vec<u8> {
        header_signing_bytes(
            self.index,
            &self.transactions,
            self.timestamp,
            &self.previous_hash,
        )
    }

    /// Recomputes the content hash over every field except `hash`.
    ///
    /// A well-formed block satisfies `block.compute_hash() == block.hash`;
    /// anything else is treated as a failed proof.
    pub fn compute_hash(&self) -> Hash256 {
        fingerprint::fingerprint(&HashView {
            index: self.index,
            transactions: &self.transactions,
            proof_of_verification: &self.proof_of_verification,
            timestamp: self.timestamp,
            previous_hash: &self.previous_hash,
        })
    }

    /// True for the index-0 block with an all-zero parent hash.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash256::zero()
    }
}

/// Canonical signing bytes for a header that does not exist as a
/// [`Block`] yet. The block builder signs these before it can assemble
/// the full block (the proof is itself a block field).
pub fn header_signing_bytes(
    index: u64,
    transactions: &BTreeMap<TxId, Transaction>,
    timestamp: u64,
    previous_hash: &Hash256,
) -> Vec<u8> {
    fingerprint::canonical_bytes(&SigningView {
        index,
        transactions,
        timestamp,
        previous_hash,
    })
}
