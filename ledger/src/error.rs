use std::fmt;

use crate::types::{Hash256, TxId};

/// Errors surfaced by the ledger engine.
///
/// All of these are local, synchronous outcomes returned to the
/// transport layer; none is retried internally. Idempotent dedup is
/// deliberately *not* an error: re-admitting a known transaction or
/// re-delivering an already-committed block both succeed as no-ops.
#[derive(Debug)]
pub enum LedgerError {
    /// A transaction or block signature failed verification.
    InvalidSignature,
    /// A block's authority proof (or its content hash) failed verification.
    InvalidProof { index: u64 },
    /// A block contains a transaction that does not verify on its own.
    InvalidTransaction { index: u64, tx_id: TxId },
    /// A candidate block's `previous_hash` does not match the chain tip.
    ContinuityMismatch {
        index: u64,
        expected: Hash256,
        found: Hash256,
    },
    /// A fetched block does not carry the height it was advertised under.
    AdvertMismatch { advertised: u64, actual: u64 },
    /// Replay of an externally supplied chain dump failed; nothing was adopted.
    TamperedChain { index: u64 },
    /// The dump offered for bootstrap contained no genesis block.
    EmptyDump,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidSignature => {
                write!(f, "signature does not verify under the supplied public key")
            }
            LedgerError::InvalidProof { index } => {
                write!(f, "block {index}: proof of verification does not verify")
            }
            LedgerError::InvalidTransaction { index, tx_id } => {
                write!(f, "block {index}: transaction {tx_id} does not verify")
            }
            LedgerError::ContinuityMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "block {index}: previous_hash {found} does not match chain tip {expected}"
            ),
            LedgerError::AdvertMismatch { advertised, actual } => write!(
                f,
                "peer served block {actual} for an advertisement of height {advertised}"
            ),
            LedgerError::TamperedChain { index } => {
                write!(f, "chain dump is tampered at block {index}; nothing adopted")
            }
            LedgerError::EmptyDump => write!(f, "chain dump contains no blocks"),
        }
    }
}

impl std::error::Error for LedgerError {}
