//! Gossip coordination.
//!
//! Drives the advertise → fetch-if-unknown → re-broadcast protocol for
//! transactions and blocks. The coordinator is deliberately ignorant of
//! node state: callers compute the peer list and payloads while holding
//! the node lock, release it, and then let the coordinator perform the
//! outbound calls. Peer failures are logged and swallowed; propagation
//! is best-effort and never aborts the local operation.

use serde::{Deserialize, Serialize};

use crate::types::{Block, PeerAddr, Transaction, TxId};

/// HTTP client implementation of [`PeerClient`].
pub mod http;

pub use http::HttpPeerClient;

/// Advertisement of a newly admitted transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionAdvert {
    pub transaction_id: TxId,
}

/// A peer's reply to a transaction advertisement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionAdvertReply {
    /// Whether the peer wants the full transaction pushed to it.
    pub requested: bool,
    /// The replying peer's own address, used as the push target.
    pub peer: PeerAddr,
}

/// Advertisement of a proposed or freshly validated block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockAdvert {
    /// Height of the advertised block.
    pub block_id: u64,
    /// Address the full block can be fetched from.
    pub peer: PeerAddr,
}

/// Request for a full block by height.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockRequest {
    pub block_id: u64,
}

/// Ordered chain dump served to bootstrapping peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainDump {
    pub length: usize,
    pub chain: Vec<Block>,
}

/// Registration request sent to an existing node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node_address: PeerAddr,
}

/// Registration response: the chain to sync from plus known peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub length: usize,
    pub chain: Vec<Block>,
    pub peers: Vec<PeerAddr>,
}

/// Errors raised while contacting a peer.
///
/// These never escape the gossip layer as hard failures; a peer that
/// cannot be reached is simply unreachable for this round.
#[derive(Debug)]
pub enum PeerError {
    /// Transport-level error (connection refused, timeout, non-2xx).
    Transport(String),
    /// The peer returned a malformed or unexpected response body.
    Protocol(String),
}

impl std::fmt::Display for PeerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerError::Transport(msg) => write!(f, "peer transport error: {msg}"),
            PeerError::Protocol(msg) => write!(f, "peer protocol error: {msg}"),
        }
    }
}

impl std::error::Error for PeerError {}

/// Abstract peer transport used by the [`GossipCoordinator`].
///
/// Implementations are responsible for the wire protocol only; retry
/// and ordering policy live with the caller (there is none; calls are
/// one-shot by design).
pub trait PeerClient: Send + Sync {
    /// Announces a transaction id; the peer replies whether it wants
    /// the full payload.
    fn advertise_transaction(
        &self,
        peer: &PeerAddr,
        advert: &TransactionAdvert,
    ) -> Result<TransactionAdvertReply, PeerError>;

    /// Pushes a full transaction to a peer that requested it.
    fn push_transaction(&self, peer: &PeerAddr, tx: &Transaction) -> Result<(), PeerError>;

    /// Announces a block height together with the address it can be
    /// fetched from.
    fn advertise_block(&self, peer: &PeerAddr, advert: &BlockAdvert) -> Result<(), PeerError>;

    /// Fetches a full block by height from the advertiser.
    fn fetch_block(&self, peer: &PeerAddr, request: &BlockRequest) -> Result<Block, PeerError>;

    /// Registers this node with an existing peer and returns its chain
    /// dump and peer list for bootstrap.
    fn register(
        &self,
        peer: &PeerAddr,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, PeerError>;
}

/// Best-effort fan-out of advertisements and payloads to the peer set.
pub struct GossipCoordinator<C> {
    client: C,
    self_address: PeerAddr,
}

impl<C: PeerClient> GossipCoordinator<C> {
    pub fn new(client: C, self_address: PeerAddr) -> Self {
        Self {
            client,
            self_address: self_address.normalized(),
        }
    }

    /// This node's address as embedded in outgoing advertisements.
    pub fn self_address(&self) -> &PeerAddr {
        &self.self_address
    }

    /// Advertises a newly admitted transaction to every peer and pushes
    /// the full payload to each peer that asked for it.
    ///
    /// Idempotent by construction: the remote admission path dedupes by
    /// fingerprint, so double delivery is harmless.
    pub fn broadcast_transaction(&self, peers: &[PeerAddr], id: &TxId, tx: &Transaction) {
        let advert = TransactionAdvert {
            transaction_id: id.clone(),
        };

        let mut requesters = Vec::new();
        for peer in peers {
            match self.client.advertise_transaction(peer, &advert) {
                Ok(reply) if reply.requested => requesters.push(reply.peer),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "peer unreachable for tx advertisement");
                }
            }
        }

        for peer in requesters {
            if let Err(e) = self.client.push_transaction(&peer, tx) {
                tracing::warn!(peer = %peer, error = %e, "failed to push transaction");
            }
        }
    }

    /// Advertises a block height to the given peers (already filtered
    /// by the caller to exclude the advertiser we learned it from).
    /// Each node advertises an index at most once per index it newly
    /// learns, which bounds the flood.
    pub fn advertise_block(&self, peers: &[PeerAddr], index: u64) {
        let advert = BlockAdvert {
            block_id: index,
            peer: self.self_address.clone(),
        };

        for peer in peers {
            if let Err(e) = self.client.advertise_block(peer, &advert) {
                tracing::warn!(peer = %peer, index, error = %e, "peer unreachable for block advertisement");
            }
        }
    }

    /// Fetches the full block behind an advertisement. A failure means
    /// the advertiser's candidate is simply never recorded; it does not
    /// block quorum accrual from other peers and is not retried.
    pub fn fetch_block(&self, peer: &PeerAddr, index: u64) -> Result<Block, PeerError> {
        self.client
            .fetch_block(peer, &BlockRequest { block_id: index })
    }

    /// Registers with an existing node, returning its chain and peers.
    pub fn register_with(&self, peer: &PeerAddr) -> Result<RegisterResponse, PeerError> {
        self.client.register(
            peer,
            &RegisterRequest {
                node_address: self.self_address.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scriptable in-memory peer transport.
    #[derive(Default)]
    struct MockClient {
        log: Mutex<Vec<String>>,
        /// Peers that will answer `requested: true`.
        requesters: Vec<PeerAddr>,
        /// Peers that fail every call.
        unreachable: Vec<PeerAddr>,
    }

    impl MockClient {
        fn log(&self, line: String) {
            self.log.lock().expect("log lock").push(line);
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().expect("log lock").clone()
        }
    }

    impl PeerClient for MockClient {
        fn advertise_transaction(
            &self,
            peer: &PeerAddr,
            advert: &TransactionAdvert,
        ) -> Result<TransactionAdvertReply, PeerError> {
            if self.unreachable.contains(peer) {
                return Err(PeerError::Transport("connection refused".into()));
            }
            self.log(format!("adv_tx {} {}", peer, advert.transaction_id));
            Ok(TransactionAdvertReply {
                requested: self.requesters.contains(peer),
                peer: peer.clone(),
            })
        }

        fn push_transaction(&self, peer: &PeerAddr, _tx: &Transaction) -> Result<(), PeerError> {
            self.log(format!("push_tx {peer}"));
            Ok(())
        }

        fn advertise_block(&self, peer: &PeerAddr, advert: &BlockAdvert) -> Result<(), PeerError> {
            if self.unreachable.contains(peer) {
                return Err(PeerError::Transport("connection refused".into()));
            }
            self.log(format!("adv_block {} {}", peer, advert.block_id));
            Ok(())
        }

        fn fetch_block(&self, _peer: &PeerAddr, _request: &BlockRequest) -> Result<Block, PeerError> {
            Err(PeerError::Transport("not scripted".into()))
        }

        fn register(
            &self,
            _peer: &PeerAddr,
            _request: &RegisterRequest,
        ) -> Result<RegisterResponse, PeerError> {
            Err(PeerError::Transport("not scripted".into()))
        }
    }

    fn peer(n: u8) -> PeerAddr {
        PeerAddr(format!("http://localhost:700{n}"))
    }

    fn signed_vote() -> Transaction {
        use crate::signer::{Ed25519Authority, Signer};
        let key = Ed25519Authority::from_seed([1; 32]);
        Transaction {
            public_key: key.public_key(),
            signature: key.sign(b"candidate-a"),
            vote: "candidate-a".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn transaction_broadcast_pushes_only_to_requesters() {
        let client = MockClient {
            requesters: vec![peer(2)],
            ..Default::default()
        };
        let gossip = GossipCoordinator::new(client, peer(1));

        let id = TxId::new("7001", 1);
        gossip.broadcast_transaction(&[peer(2), peer(3)], &id, &signed_vote());

        let calls = gossip.client.calls();
        assert!(calls.contains(&format!("adv_tx {} {id}", peer(2))));
        assert!(calls.contains(&format!("adv_tx {} {id}", peer(3))));
        assert!(calls.contains(&format!("push_tx {}", peer(2))));
        assert!(!calls.contains(&format!("push_tx {}", peer(3))));
    }

    #[test]
    fn unreachable_peer_does_not_abort_the_round() {
        let client = MockClient {
            requesters: vec![peer(3)],
            unreachable: vec![peer(2)],
            ..Default::default()
        };
        let gossip = GossipCoordinator::new(client, peer(1));

        let id = TxId::new("7001", 1);
        gossip.broadcast_transaction(&[peer(2), peer(3)], &id, &signed_vote());

        let calls = gossip.client.calls();
        assert!(calls.contains(&format!("push_tx {}", peer(3))));
    }

    #[test]
    fn block_advertisement_carries_self_address() {
        let client = MockClient::default();
        let gossip = GossipCoordinator::new(client, PeerAddr("http://localhost:7001/".into()));

        assert_eq!(gossip.self_address().as_str(), "http://localhost:7001");
        gossip.advertise_block(&[peer(2)], 4);
        assert!(gossip.client.calls().contains(&format!("adv_block {} 4", peer(2))));
    }
}
