//! Append-only chain store.
//!
//! The store owns the ordered sequence of committed blocks and is the
//! only place the chain is ever mutated. It enforces hash-chain
//! continuity on append and supports atomic replay of an externally
//! supplied chain dump during bootstrap. There are no rewrites and no
//! retained forks: the first block committed at an index wins, and
//! later arrivals at or below the tip are absorbed as no-ops.

use crate::error::LedgerError;
use crate::types::Block;
use crate::validation::BlockValidity;

/// Outcome of a successful append call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AppendOutcome {
    /// The block extended the chain.
    Appended,
    /// The chain already covers this index; idempotent re-delivery.
    AlreadyKnown,
}

/// Ordered, append-only sequence of committed blocks.
///
/// Invariant: never empty (constructed from a genesis block), indices
/// strictly increasing by one, each block linked to its parent by
/// `previous_hash`.
#[derive(Debug)]
pub struct ChainStore {
    blocks: Vec<Block>,
}

impl ChainStore {
    /// Creates a store rooted at the given genesis block.
    ///
    /// The caller is responsible for the genesis block's provenance:
    /// either freshly minted by the local authority signer or accepted
    /// from a replayed dump.
    pub fn with_genesis(genesis: Block) -> Self {
        Self {
            blocks: vec![genesis],
        }
    }

    /// The most recently committed block.
    pub fn tip(&self) -> &Block {
        // Invariant: blocks is never empty.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of committed blocks (genesis included).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Fetches a committed block by index.
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Appends a validated successor block to the chain.
    ///
    /// A block at or below the current tip is treated as already
    /// satisfied and returns [`AppendOutcome::AlreadyKnown`]: duplicate
    /// delivery is expected under gossip, not an error. A genuine
    /// successor must link to the tip hash and pass the full validity
    /// predicate; otherwise it is rejected and the chain is unchanged.
    pub fn append(
        &mut self,
        block: Block,
        validity: &BlockValidity,
    ) -> Result<AppendOutcome, LedgerError> {
        let tip = self.tip();

        if block.index <= tip.index {
            return Ok(AppendOutcome::AlreadyKnown);
        }

        if block.index != tip.index + 1 || block.previous_hash != tip.hash {
            return Err(LedgerError::ContinuityMismatch {
                index: block.index,
                expected: tip.hash,
                found: block.previous_hash,
            });
        }

        validity.validate(&block)?;

        self.blocks.push(block);
        Ok(AppendOutcome::Appended)
    }

    /// Rebuilds a chain from an externally supplied dump.
    ///
    /// Block 0 is adopted unconditionally as genesis; its signature is
    /// not the basis of trust for a bootstrapping node; continuity
    /// from block 1 onward is. Every subsequent block goes through the
    /// same checks as [`append`](Self::append); the first failure
    /// aborts the whole replay with [`LedgerError::TamperedChain`] and
    /// no prefix of the dump is adopted.
    pub fn replay_dump(
        dump: Vec<Block>,
        validity: &BlockValidity,
    ) -> Result<Self, LedgerError> {
        let mut blocks = dump.into_iter();
        let genesis = blocks.next().ok_or(LedgerError::EmptyDump)?;

        let mut store = ChainStore::with_genesis(genesis);
        for block in blocks {
            let index = block.index;
            match store.append(block, validity) {
                Ok(AppendOutcome::Appended) => {}
                // A dump must be strictly increasing; a stale or
                // invalid entry means the dump was doctored.
                Ok(AppendOutcome::AlreadyKnown) | Err(_) => {
                    return Err(LedgerError::TamperedChain { index });
                }
            }
        }

        Ok(store)
    }

    /// Returns the full chain in canonical order for peers to replay.
    pub fn dump(&self) -> Vec<Block> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BlockBuilder;
    use crate::pool::TransactionPool;
    use crate::signer::{Ed25519Authority, Signer};
    use crate::types::Transaction;

    fn authority_builder() -> BlockBuilder<Ed25519Authority> {
        BlockBuilder::new(Ed25519Authority::from_seed([5; 32]))
    }

    fn validity() -> BlockValidity {
        BlockValidity::new(Ed25519Authority::from_seed([5; 32]).public_key())
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

    /// Builds a chain of `extra` blocks on top of genesis, one vote each.
    fn chain_of(extra: u64) -> (ChainStore, BlockValidity) {
        let b = authority_builder();
        let v = validity();
        let mut store = ChainStore::with_genesis(b.genesis(1_700_000_000));

        for i in 0..extra {
            let mut pool = TransactionPool::new("7001");
            pool.admit(signed_vote((i + 1) as u8, &format!("vote-{i}")))
                .expect("admit");
            let block = b
                .propose(store.tip(), &pool, 1_700_000_010 + i)
                .expect("propose")
                .expect("block");
            let outcome = store.append(block, &v).expect("append");
            assert_eq!(outcome, AppendOutcome::Appended);
        }

        (store, v)
    }

    #[test]
    fn chain_links_and_indices_are_consistent() {
        let (store, _) = chain_of(3);
        let dump = store.dump();

        for (i, block) in dump.iter().enumerate() {
            assert_eq!(block.index, i as u64);
            if i > 0 {
                assert_eq!(block.previous_hash, dump[i - 1].hash);
            }
        }
    }

    #[test]
    fn redelivered_old_block_is_a_noop() {
        let (mut store, v) = chain_of(2);
        let old = store.get(1).expect("block 1").clone();

        let outcome = store.append(old, &v).expect("append");
        assert_eq!(outcome, AppendOutcome::AlreadyKnown);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn unlinked_successor_is_rejected() {
        let (mut store, v) = chain_of(1);
        let b = authority_builder();

        // Build a block whose parent is genesis, not the current tip.
        let genesis = store.get(0).expect("genesis").clone();
        let mut pool = TransactionPool::new("7002");
        pool.admit(signed_vote(9, "vote-x")).expect("admit");
        let mut orphan = b
            .propose(&genesis, &pool, 1_700_000_050)
            .expect("propose")
            .expect("block");
        orphan.index = 2; // claims to extend the tip but links to genesis

        let err = store.append(orphan, &v).unwrap_err();
        assert!(matches!(err, LedgerError::ContinuityMismatch { .. }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replay_accepts_an_honest_dump() {
        let (store, v) = chain_of(3);
        let replayed = ChainStore::replay_dump(store.dump(), &v).expect("replay");

        assert_eq!(replayed.len(), 4);
        assert_eq!(replayed.tip().hash, store.tip().hash);
    }

    #[test]
    fn replay_rejects_any_mutated_field_atomically() {
        let (store, v) = chain_of(3);

        // Mutate one field of a non-genesis block after signing.
        let mut doctored = store.dump();
        doctored[2].timestamp += 1;
        doctored[2].hash = doctored[2].compute_hash();

        let err = ChainStore::replay_dump(doctored, &v).unwrap_err();
        assert!(matches!(err, LedgerError::TamperedChain { index: 2 }));
    }

    #[test]
    fn replay_rejects_relinked_chain() {
        let (store, v) = chain_of(3);

        // Splice out block 1: continuity must break at the gap.
        let mut spliced = store.dump();
        spliced.remove(1);

        let err = ChainStore::replay_dump(spliced, &v).unwrap_err();
        assert!(matches!(err, LedgerError::TamperedChain { index: 2 }));
    }

    #[test]
    fn replay_of_empty_dump_fails() {
        let v = validity();
        let err = ChainStore::replay_dump(Vec::new(), &v).unwrap_err();
        assert!(matches!(err, LedgerError::EmptyDump));
    }

    #[test]
    fn genesis_of_a_dump_is_trusted_unconditionally() {
        let (store, _) = chain_of(2);

        // Replay under a *different* authority: genesis passes (trusted
        // at position 0), but block 1's proof no longer verifies.
        let other = BlockValidity::new(Ed25519Authority::from_seed([7; 32]).public_key());
        let err = ChainStore::replay_dump(store.dump(), &other).unwrap_err();
        assert!(matches!(err, LedgerError::TamperedChain { index: 1 }));
    }
}
