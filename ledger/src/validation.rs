//! Block validity predicate.
//!
//! A block is well-formed only if every transaction it contains
//! independently verifies, its proof of verification verifies over the
//! header under the chain's authority key, and its stored hash matches
//! the recomputed content hash. Chain continuity is checked separately
//! by the store; this predicate is purely block-local and deterministic.

use crate::error::LedgerError;
use crate::signer;
use crate::types::{Block, PublicKey};

/// Validates candidate blocks against the authority verifying key.
#[derive(Clone, Debug)]
pub struct BlockValidity {
    authority: PublicKey,
}

impl BlockValidity {
    pub fn new(authority: PublicKey) -> Self {
        Self { authority }
    }

    /// Returns the authority verifying key this predicate checks against.
    pub fn authority(&self) -> &PublicKey {
        &self.authority
    }

    /// Runs the full block-local validity check.
    ///
    /// Checks run cheapest-destructive-first: transaction signatures,
    /// then the authority proof, then the content hash. The first
    /// failure wins; a failed candidate is discarded, never mutated.
    pub fn validate(&self, block: &Block) -> Result<(), LedgerError> {
        for (id, tx) in &block.transactions {
            if !tx.verify() {
                return Err(LedgerError::InvalidTransaction {
                    index: block.index,
                    tx_id: id.clone(),
                });
            }
        }

        if !signer::verify(
            &self.authority,
            &block.signing_bytes(),
            &block.proof_of_verification,
        ) {
            return Err(LedgerError::InvalidProof { index: block.index });
        }

        // The stored hash is part of what peers advertise and chain
        // children link against, so it must match the content.
        if block.compute_hash() != block.hash {
            return Err(LedgerError::InvalidProof { index: block.index });
        }

        Ok(())
    }
}
