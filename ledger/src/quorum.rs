//! Quorum buffer for peer-proposed blocks.
//!
//! Blocks advertised by peers are not committed directly; they sit in
//! this buffer while distinct-peer acknowledgements accumulate. One
//! entry per index holds the fetched candidate *and* its ack set
//! together, so the two can never drift apart. An entry is destroyed
//! when its block is handed to the chain store, or pruned once the
//! chain grows past its index.

use std::collections::{BTreeMap, HashSet};

use crate::types::{Block, PeerAddr};

/// Disposition of an incoming block advertisement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdvertOutcome {
    /// First sighting of this index: the caller must fetch the full
    /// block from the advertiser.
    NeedFetch,
    /// The index is already buffered; the advertiser was counted as an
    /// acknowledgement (once: duplicates from the same peer are ignored
    /// to prevent quorum inflation from re-broadcast storms).
    AlreadyKnown,
}

/// Per-index buffered state: candidate block plus distinct acks.
struct QuorumEntry {
    candidate: Option<Block>,
    acks: HashSet<PeerAddr>,
}

/// Buffer of peer-proposed blocks awaiting majority acknowledgement.
#[derive(Default)]
pub struct QuorumBuffer {
    entries: BTreeMap<u64, QuorumEntry>,
}

impl QuorumBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an advertisement for `index` from `source`.
    ///
    /// The first advertisement for an unseen index creates the entry
    /// and asks the caller to fetch the block; the advertiser is only
    /// counted once the fetched candidate is recorded, so a failed
    /// fetch leaves the count at zero while still marking the index as
    /// seen (no re-fetch storms, per the best-effort policy).
    pub fn observe_advertisement(&mut self, index: u64, source: PeerAddr) -> AdvertOutcome {
        match self.entries.get_mut(&index) {
            Some(entry) => {
                entry.acks.insert(source);
                AdvertOutcome::AlreadyKnown
            }
            None => {
                self.entries.insert(
                    index,
                    QuorumEntry {
                        candidate: None,
                        acks: HashSet::new(),
                    },
                );
                AdvertOutcome::NeedFetch
            }
        }
    }

    /// Stores the fetched, independently validated candidate for
    /// `index` and seeds its ack set with the advertiser.
    pub fn record_candidate(&mut self, index: u64, block: Block, source: PeerAddr) {
        let entry = self.entries.entry(index).or_insert(QuorumEntry {
            candidate: None,
            acks: HashSet::new(),
        });
        entry.candidate = Some(block);
        entry.acks.insert(source);
    }

    /// Number of distinct peers that acknowledged `index`.
    pub fn ack_count(&self, index: u64) -> usize {
        self.entries.get(&index).map_or(0, |e| e.acks.len())
    }

    /// Whether `index` has reached a strict majority of the node's view
    /// of the network: `acks >= floor((network_size + 1) / 2)`, where
    /// `network_size` counts the peers plus the node itself.
    pub fn has_quorum(&self, index: u64, network_size: usize) -> bool {
        self.ack_count(index) >= quorum_threshold(network_size)
    }

    /// Removes and returns the candidate at `index` if it has both
    /// quorum and a recorded block. The entry is cleared here, before
    /// the append is attempted: a candidate the chain rejects is
    /// discarded, not retried.
    pub fn take_ready(&mut self, index: u64, network_size: usize) -> Option<Block> {
        let ready = self
            .entries
            .get(&index)
            .is_some_and(|e| e.candidate.is_some() && e.acks.len() >= quorum_threshold(network_size));
        if !ready {
            return None;
        }
        self.entries.remove(&index).and_then(|e| e.candidate)
    }

    /// Serves a buffered candidate to a peer that requested it.
    pub fn candidate(&self, index: u64) -> Option<&Block> {
        self.entries.get(&index).and_then(|e| e.candidate.as_ref())
    }

    /// Drops every entry at or below `index`, which the chain now covers.
    pub fn prune_through(&mut self, index: u64) {
        self.entries = self.entries.split_off(&(index + 1));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strict-majority threshold over a network of `network_size` nodes.
pub fn quorum_threshold(network_size: usize) -> usize {
    (network_size + 1) / 2
}
