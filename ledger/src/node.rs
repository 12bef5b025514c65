//! The ledger node state machine.
//!
//! [`LedgerNode`] owns every piece of single-writer state (transaction
//! pool, committed chain, quorum buffer, peer set) behind one
//! synchronization boundary. Hosts wrap it in a mutex (or drive it from
//! a single task) and must not interleave two mutating calls. None of
//! the methods here perform I/O: each inbound event maps to one method,
//! and methods that imply outbound traffic return what the transport
//! layer should send, to be performed *after* the lock is released.

use std::collections::BTreeSet;

use crate::builder::BlockBuilder;
use crate::config::NodeConfig;
use crate::error::LedgerError;
use crate::pool::{Admission, TransactionPool};
use crate::quorum::{AdvertOutcome, QuorumBuffer};
use crate::signer::Signer;
use crate::store::{AppendOutcome, ChainStore};
use crate::types::{Block, PeerAddr, PublicKey, Transaction, TxId};
use crate::validation::BlockValidity;

/// What the transport layer should do with an inbound block advertisement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdvertDisposition {
    /// The index is at or below the local tip; nothing to do.
    Stale,
    /// First sighting: fetch the full block from the advertiser, then
    /// call [`LedgerNode::record_fetched_block`].
    NeedFetch,
    /// The advertiser was counted as an acknowledgement. When
    /// `quorum_reached` is set, follow up with
    /// [`LedgerNode::commit_ready`].
    Counted { quorum_reached: bool },
}

/// Indices committed by a single [`LedgerNode::commit_ready`] call.
///
/// More than one entry means buffered successors cascaded in behind the
/// block that reached quorum.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommitSummary {
    pub committed: Vec<u64>,
}

/// A single replica of the vote ledger.
pub struct LedgerNode<S> {
    config: NodeConfig,
    builder: BlockBuilder<S>,
    validity: BlockValidity,
    pool: TransactionPool,
    chain: ChainStore,
    quorum: QuorumBuffer,
    peers: BTreeSet<PeerAddr>,
}

impl<S: Signer> LedgerNode<S> {
    /// Creates a node with a freshly minted, authority-signed genesis
    /// block. A node that should adopt an existing chain instead calls
    /// [`adopt_chain`](Self::adopt_chain) right after construction.
    pub fn new(
        config: NodeConfig,
        signer: S,
        authority: PublicKey,
        genesis_timestamp: u64,
    ) -> Self {
        let builder = BlockBuilder::new(signer);
        let genesis = builder.genesis(genesis_timestamp);
        Self {
            pool: TransactionPool::new(config.node_id.clone()),
            config,
            builder,
            validity: BlockValidity::new(authority),
            chain: ChainStore::with_genesis(genesis),
            quorum: QuorumBuffer::new(),
            peers: BTreeSet::new(),
        }
    }

    /// Address this node advertises itself under.
    pub fn self_address(&self) -> &PeerAddr {
        &self.config.self_address
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Admits a vote transaction into the pool (signature check +
    /// fingerprint dedup). On `is_new`, the caller should broadcast the
    /// transaction to the current peer set.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<Admission, LedgerError> {
        self.pool.admit(tx)
    }

    /// Answers a peer's transaction advertisement: do we want the full
    /// payload pushed to us?
    pub fn transaction_requested(&self, id: &TxId) -> bool {
        !self.pool.contains(id)
    }

    /// Current pool contents (diagnostics / peer listing).
    pub fn pool_snapshot(&self) -> std::collections::BTreeMap<TxId, Transaction> {
        self.pool.snapshot()
    }

    // ------------------------------------------------------------------
    // Proposal
    // ------------------------------------------------------------------

    /// Builds, validates, and locally commits a block from the pool.
    ///
    /// Returns `Ok(None)` when the pool is empty. On success the
    /// settled transactions leave the pool and the caller should
    /// advertise the returned block to every peer. A node always trusts
    /// its own proposals: they commit directly, without passing through
    /// the quorum buffer.
    pub fn propose_block(&mut self, timestamp: u64) -> Result<Option<Block>, LedgerError> {
        let Some(block) = self.builder.propose(self.chain.tip(), &self.pool, timestamp)? else {
            return Ok(None);
        };

        self.chain.append(block.clone(), &self.validity)?;
        self.pool.settle(block.transactions.values());
        self.quorum.prune_through(block.index);

        Ok(Some(block))
    }

    // ------------------------------------------------------------------
    // Peer block protocol
    // ------------------------------------------------------------------

    /// Handles an inbound block advertisement from `source`.
    pub fn observe_block_advertisement(
        &mut self,
        index: u64,
        source: &PeerAddr,
    ) -> AdvertDisposition {
        if index <= self.chain.tip().index {
            return AdvertDisposition::Stale;
        }

        match self.quorum.observe_advertisement(index, source.normalized()) {
            AdvertOutcome::NeedFetch => AdvertDisposition::NeedFetch,
            AdvertOutcome::AlreadyKnown => AdvertDisposition::Counted {
                quorum_reached: self.quorum.has_quorum(index, self.network_size()),
            },
        }
    }

    /// Accepts a block fetched in response to an advertisement.
    ///
    /// The block is validated, its transactions are stripped from the
    /// local pool (they are settled by this block and must not be
    /// double-proposed), and it becomes the buffered candidate with the
    /// advertiser as its first acknowledgement. Returns whether the
    /// index already holds quorum, which happens in tiny networks where
    /// a single ack is a majority.
    pub fn record_fetched_block(
        &mut self,
        index: u64,
        block: Block,
        source: &PeerAddr,
    ) -> Result<bool, LedgerError> {
        if index <= self.chain.tip().index {
            return Ok(false);
        }
        if block.index != index {
            return Err(LedgerError::AdvertMismatch {
                advertised: index,
                actual: block.index,
            });
        }

        self.validity.validate(&block)?;

        self.pool.settle(block.transactions.values());
        self.quorum.record_candidate(index, block, source.normalized());

        Ok(self.quorum.has_quorum(index, self.network_size()))
    }

    /// Commits the buffered candidate at `index` if it holds quorum,
    /// then cascades: any buffered successor that already holds quorum
    /// commits in the same call, so out-of-order delivery needs no
    /// fresh advertisements.
    ///
    /// A candidate ahead of the tip keeps waiting in the buffer for its
    /// predecessor; a candidate the chain rejects has already left the
    /// buffer by the time the error is returned. It is discarded, not
    /// retried.
    pub fn commit_ready(&mut self, index: u64) -> Result<CommitSummary, LedgerError> {
        let mut summary = CommitSummary::default();

        if index != self.chain.tip().index + 1 {
            // Stale, or waiting for a gap below it to fill.
            return Ok(summary);
        }

        loop {
            let next = self.chain.tip().index + 1;
            let n = self.network_size();
            match self.quorum.take_ready(next, n) {
                Some(block) => self.commit_block(block, &mut summary)?,
                None => break,
            }
        }

        Ok(summary)
    }

    fn commit_block(
        &mut self,
        block: Block,
        summary: &mut CommitSummary,
    ) -> Result<(), LedgerError> {
        let index = block.index;
        let settled: Vec<Transaction> = block.transactions.values().cloned().collect();

        match self.chain.append(block, &self.validity)? {
            AppendOutcome::Appended => {
                self.pool.settle(settled.iter());
                self.quorum.prune_through(index);
                summary.committed.push(index);
            }
            AppendOutcome::AlreadyKnown => {}
        }
        Ok(())
    }

    /// Serves a block-by-height request: committed blocks first, then
    /// buffered candidates a peer may legitimately ask about.
    pub fn block_for_request(&self, index: u64) -> Option<Block> {
        if let Some(block) = self.chain.get(index) {
            return Some(block.clone());
        }
        self.quorum.candidate(index).cloned()
    }

    // ------------------------------------------------------------------
    // Chain access & bootstrap
    // ------------------------------------------------------------------

    /// Height of the committed chain tip.
    pub fn tip_index(&self) -> u64 {
        self.chain.tip().index
    }

    /// Full committed chain in canonical order.
    pub fn chain_dump(&self) -> Vec<Block> {
        self.chain.dump()
    }

    /// Replaces the local chain with a replayed, verified copy of an
    /// external dump. All-or-nothing: on [`LedgerError::TamperedChain`]
    /// the current chain (and everything else) is left untouched.
    pub fn adopt_chain(&mut self, dump: Vec<Block>) -> Result<(), LedgerError> {
        let chain = ChainStore::replay_dump(dump, &self.validity)?;
        let tip = chain.tip().index;
        // Votes the adopted chain already settles must leave the pool,
        // or the next proposal would commit them a second time.
        for block in chain.dump() {
            self.pool.settle(block.transactions.values());
        }
        self.chain = chain;
        self.quorum.prune_through(tip);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Peer set
    // ------------------------------------------------------------------

    /// Adds a peer address; self-registration is ignored. Returns
    /// whether the set changed.
    pub fn register_peer(&mut self, addr: PeerAddr) -> bool {
        let addr = addr.normalized();
        if addr == self.config.self_address.normalized() {
            return false;
        }
        self.peers.insert(addr)
    }

    /// Merges a peer list obtained during registration.
    pub fn merge_peers<I: IntoIterator<Item = PeerAddr>>(&mut self, addrs: I) {
        for addr in addrs {
            self.register_peer(addr);
        }
    }

    /// Snapshot of known peers, optionally excluding one address (the
    /// peer an advertisement was learned from).
    pub fn peers_except(&self, excluded: Option<&PeerAddr>) -> Vec<PeerAddr> {
        let excluded = excluded.map(PeerAddr::normalized);
        self.peers
            .iter()
            .filter(|p| excluded.as_ref() != Some(*p))
            .cloned()
            .collect()
    }

    /// All known peers.
    pub fn peers(&self) -> Vec<PeerAddr> {
        self.peers.iter().cloned().collect()
    }

    /// Size of this node's view of the network, itself included.
    pub fn network_size(&self) -> usize {
        self.peers.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Ed25519Authority, Signer as _};

    const AUTHORITY_SEED: [u8; 32] = [5; 32];

    fn authority() -> Ed25519Authority {
        Ed25519Authority::from_seed(AUTHORITY_SEED)
    }

    fn node(node_id: &str) -> LedgerNode<Ed25519Authority> {
        let config = NodeConfig {
            node_id: node_id.to_string(),
            self_address: PeerAddr(format!("http://localhost:{node_id}")),
        };
        LedgerNode::new(config, authority(), authority().public_key(), 1_700_000_000)
    }

    fn peer(n: u8) -> PeerAddr {
        PeerAddr(format!("http://localhost:900{n}"))
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

    /// Drives a sibling node (same authority, same genesis timestamp)
    /// to produce a committed chain of the given extra length.
    fn sibling_chain(extra: u64) -> Vec<Block> {
        let mut proposer = node("8001");
        for i in 0..extra {
            proposer
                .submit_transaction(signed_vote((10 + i) as u8, &format!("vote-{i}")))
                .expect("admit");
            proposer
                .propose_block(1_700_000_100 + i)
                .expect("propose")
                .expect("block");
        }
        proposer.chain_dump()
    }

    #[test]
    fn propose_with_empty_pool_returns_none() {
        let mut n = node("7001");
        let proposal = n.propose_block(1_700_000_010).expect("propose");
        assert!(proposal.is_none());
        assert_eq!(n.tip_index(), 0);
    }

    #[test]
    fn propose_commits_locally_and_drains_settled_votes() {
        let mut n = node("7001");
        let admitted = n
            .submit_transaction(signed_vote(1, "candidate-a"))
            .expect("admit");
        assert!(admitted.is_new);

        let block = n
            .propose_block(1_700_000_010)
            .expect("propose")
            .expect("block");

        assert_eq!(block.index, 1);
        assert!(block.transactions.contains_key(&admitted.id));
        assert_eq!(n.tip_index(), 1);
        assert!(n.pool_snapshot().is_empty());
    }

    #[test]
    fn three_node_quorum_commits_on_second_ack() {
        // Node B knows peers A and C: N = 3, threshold = 2.
        let mut b = node("7002");
        b.register_peer(peer(1)); // A
        b.register_peer(peer(3)); // C
        assert_eq!(b.network_size(), 3);

        let block1 = sibling_chain(1).remove(1);

        // A advertises first: B must fetch.
        assert_eq!(
            b.observe_block_advertisement(1, &peer(1)),
            AdvertDisposition::NeedFetch
        );
        let reached = b
            .record_fetched_block(1, block1, &peer(1))
            .expect("record candidate");
        assert!(!reached); // one ack of two needed

        // C advertises the same index: quorum.
        let disposition = b.observe_block_advertisement(1, &peer(3));
        assert_eq!(
            disposition,
            AdvertDisposition::Counted {
                quorum_reached: true
            }
        );

        let summary = b.commit_ready(1).expect("commit");
        assert_eq!(summary.committed, vec![1]);
        assert_eq!(b.tip_index(), 1);

        // Later advertisements for the same index are stale no-ops.
        assert_eq!(
            b.observe_block_advertisement(1, &peer(1)),
            AdvertDisposition::Stale
        );
    }

    #[test]
    fn cascade_commits_buffered_successors_without_fresh_advertisements() {
        let mut b = node("7002");
        b.register_peer(peer(1));
        b.register_peer(peer(3)); // N = 3, threshold 2

        let chain = sibling_chain(2);
        let block1 = chain[1].clone();
        let block2 = chain[2].clone();

        // Index 2 arrives first and reaches quorum while index 1 is
        // still one ack short.
        assert_eq!(
            b.observe_block_advertisement(2, &peer(1)),
            AdvertDisposition::NeedFetch
        );
        b.record_fetched_block(2, block2, &peer(1)).expect("record 2");
        assert_eq!(
            b.observe_block_advertisement(2, &peer(3)),
            AdvertDisposition::Counted {
                quorum_reached: true
            }
        );
        // Cannot commit yet: the chain tip is still 0, so the candidate
        // for index 2 keeps waiting in the buffer.
        let summary = b.commit_ready(2).expect("commit attempt");
        assert!(summary.committed.is_empty());
        assert_eq!(b.tip_index(), 0);
        assert!(b.block_for_request(2).is_some());

        // Now index 1 accrues quorum.
        assert_eq!(
            b.observe_block_advertisement(1, &peer(1)),
            AdvertDisposition::NeedFetch
        );
        b.record_fetched_block(1, block1, &peer(1)).expect("record 1");
        assert_eq!(
            b.observe_block_advertisement(1, &peer(3)),
            AdvertDisposition::Counted {
                quorum_reached: true
            }
        );

        let summary = b.commit_ready(1).expect("commit");
        assert_eq!(summary.committed, vec![1, 2]);
        assert_eq!(b.tip_index(), 2);
    }

    #[test]
    fn fetched_block_strips_settled_votes_from_the_pool() {
        let mut b = node("7002");
        b.register_peer(peer(1));

        // The same vote is admitted locally and settled remotely.
        let vote = signed_vote(10, "vote-0");
        b.submit_transaction(vote).expect("admit");
        assert_eq!(b.pool_snapshot().len(), 1);

        let block1 = sibling_chain(1).remove(1);
        b.observe_block_advertisement(1, &peer(1));
        b.record_fetched_block(1, block1, &peer(1)).expect("record");

        assert!(b.pool_snapshot().is_empty());
    }

    #[test]
    fn fetched_block_with_wrong_index_is_rejected() {
        let mut b = node("7002");
        b.register_peer(peer(1));

        let block1 = sibling_chain(1).remove(1);
        b.observe_block_advertisement(2, &peer(1));

        let err = b.record_fetched_block(2, block1, &peer(1)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AdvertMismatch {
                advertised: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn adopt_chain_is_atomic() {
        let mut b = node("7002");
        let honest = sibling_chain(3);

        let mut doctored = honest.clone();
        doctored[2].timestamp += 1;
        doctored[2].hash = doctored[2].compute_hash();

        let err = b.adopt_chain(doctored).unwrap_err();
        assert!(matches!(err, LedgerError::TamperedChain { index: 2 }));
        assert_eq!(b.tip_index(), 0); // nothing adopted

        b.adopt_chain(honest).expect("honest dump adopts");
        assert_eq!(b.tip_index(), 3);
    }

    #[test]
    fn adopt_chain_settles_votes_the_dump_already_commits() {
        let mut b = node("7002");

        // The same vote sits in B's pool and in block 1 of the dump.
        b.submit_transaction(signed_vote(10, "vote-0")).expect("admit");
        b.submit_transaction(signed_vote(99, "vote-local"))
            .expect("admit");

        b.adopt_chain(sibling_chain(1)).expect("adopt");
        assert_eq!(b.tip_index(), 1);

        // Only the unsettled vote survives; proposing must not commit
        // "vote-0" a second time.
        let leftover = b.pool_snapshot();
        assert_eq!(leftover.len(), 1);
        let block = b
            .propose_block(1_700_000_200)
            .expect("propose")
            .expect("block");
        assert_eq!(block.index, 2);
        assert!(block.transactions.values().all(|tx| tx.vote == "vote-local"));
    }

    #[test]
    fn self_registration_is_ignored_and_peers_dedupe() {
        let mut n = node("7001");
        assert!(!n.register_peer(PeerAddr("http://localhost:7001/".into())));
        assert!(n.register_peer(peer(1)));
        assert!(!n.register_peer(peer(1)));
        assert_eq!(n.network_size(), 2);

        let visible = n.peers_except(Some(&peer(1)));
        assert!(visible.is_empty());
    }
}
