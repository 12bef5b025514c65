//! Block assembly.
//!
//! The builder turns a pool snapshot into a signed candidate block on
//! top of the current tip, and mints the authority-signed genesis
//! block. It never touches the chain or the pool itself; callers commit
//! the result and evict settled transactions afterwards.

use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::pool::TransactionPool;
use crate::signer::Signer;
use crate::types::block::header_signing_bytes;
use crate::types::{Block, Hash256};

/// Assembles candidate blocks using an authority [`Signer`].
pub struct BlockBuilder<S> {
    signer: S,
}

impl<S: Signer> BlockBuilder<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    /// Returns the authority signer, e.g. to derive its public key.
    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Builds the genesis block: index 0, no transactions, zero parent.
    ///
    /// Genesis is signed by the authority key like any other block.
    pub fn genesis(&self, timestamp: u64) -> Block {
        self.assemble(0, BTreeMap::new(), timestamp, Hash256::zero())
    }

    /// Builds a candidate block from the pool on top of `tip`.
    ///
    /// Returns `Ok(None)` when the pool is empty: vacuous blocks are
    /// never built just to advance height. Every pooled transaction is
    /// re-verified before inclusion; a single failure aborts the whole
    /// proposal and leaves the pool untouched for operator inspection
    /// (no partial blocks, no silent drops).
    pub fn propose(
        &self,
        tip: &Block,
        pool: &TransactionPool,
        timestamp: u64,
    ) -> Result<Option<Block>, LedgerError> {
        if pool.is_empty() {
            return Ok(None);
        }

        let index = tip.index + 1;
        let transactions = pool.snapshot();

        for (id, tx) in &transactions {
            if !tx.verify() {
                return Err(LedgerError::InvalidTransaction {
                    index,
                    tx_id: id.clone(),
                });
            }
        }

        Ok(Some(self.assemble(index, transactions, timestamp, tip.hash)))
    }

    fn assemble(
        &self,
        index: u64,
        transactions: BTreeMap<crate::types::TxId, crate::types::Transaction>,
        timestamp: u64,
        previous_hash: Hash256,
    ) -> Block {
        let proof = self.signer.sign(&header_signing_bytes(
            index,
            &transactions,
            timestamp,
            &previous_hash,
        ));

        let mut block = Block {
            index,
            transactions,
            proof_of_verification: proof,
            timestamp,
            previous_hash,
            hash: Hash256::zero(),
        };
        block.hash = block.compute_hash();
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Ed25519Authority, Signer, verify};
    use crate::types::Transaction;

    fn builder() -> BlockBuilder<Ed25519Authority> {
        BlockBuilder::new(Ed25519Authority::from_seed([5; 32]))
    }

    fn signed_vote(seed: u8, vote: &str) -> Transaction {
        let key = Ed25519Authority::from_seed([seed; 32]);
        Transaction {
            public_key: key.public_key(),
            signature: key.sign(vote.as_bytes()),
            vote: vote.to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn genesis_is_signed_and_self_consistent() {
        let b = builder();
        let genesis = b.genesis(1_700_000_000);

        assert!(genesis.is_genesis());
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.hash, genesis.compute_hash());
        assert!(verify(
            &b.signer().public_key(),
            &genesis.signing_bytes(),
            &genesis.proof_of_verification,
        ));
    }

    #[test]
    fn empty_pool_yields_no_block() {
        let b = builder();
        let genesis = b.genesis(1_700_000_000);
        let pool = TransactionPool::new("7001");

        let proposal = b.propose(&genesis, &pool, 1_700_000_010).expect("propose");
        assert!(proposal.is_none());
    }

    #[test]
    fn proposal_links_to_tip_and_carries_pool_contents() {
        let b = builder();
        let genesis = b.genesis(1_700_000_000);

        let mut pool = TransactionPool::new("7001");
        let admitted = pool.admit(signed_vote(1, "candidate-a")).expect("admit");

        let block = b
            .propose(&genesis, &pool, 1_700_000_010)
            .expect("propose")
            .expect("non-empty pool builds a block");

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis.hash);
        assert!(block.transactions.contains_key(&admitted.id));
        // Proposal does not drain the pool; that happens on commit.
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn corrupt_pool_entry_aborts_the_whole_proposal() {
        let b = builder();
        let genesis = b.genesis(1_700_000_000);

        let mut pool = TransactionPool::new("7001");
        pool.admit(signed_vote(1, "candidate-a")).expect("admit");

        // Model a pool entry that went bad after admission.
        let mut bad = signed_vote(2, "candidate-b");
        bad.vote = "candidate-c".to_string();
        let bad_id = pool.insert_unchecked(bad);

        let err = b.propose(&genesis, &pool, 1_700_000_010).unwrap_err();
        match err {
            LedgerError::InvalidTransaction { index, tx_id } => {
                assert_eq!(index, 1);
                assert_eq!(tx_id, bad_id);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failing entry is not silently dropped.
        assert_eq!(pool.len(), 2);
    }
}
