//! Ledger library crate.
//!
//! This crate provides the core building blocks for a peer-replicated
//! vote ledger:
//!
//! - strongly-typed domain types (`types`),
//! - canonical content hashing (`fingerprint`),
//! - authority signing and verification (`signer`),
//! - the transaction pool (`pool`),
//! - block assembly (`builder`) and validity checks (`validation`),
//! - the committed chain store (`store`),
//! - the quorum buffer for peer-proposed blocks (`quorum`),
//! - the single-boundary node state machine (`node`),
//! - the peer gossip protocol and HTTP transport (`gossip`),
//! - Prometheus-based metrics (`metrics`),
//! - and top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces into reachable nodes: an
//! HTTP host wraps a [`LedgerNode`] behind a lock, routes inbound
//! protocol messages to its methods, and performs the outbound calls
//! those methods imply via a [`GossipCoordinator`].

pub mod builder;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gossip;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod quorum;
pub mod signer;
pub mod store;
pub mod types;
pub mod validation;

// Re-export top-level configuration types.
pub use config::{LedgerConfig, MetricsConfig, NodeConfig, PeerClientConfig};

// Re-export the engine surface hosts interact with.
pub use builder::BlockBuilder;
pub use error::LedgerError;
pub use node::{AdvertDisposition, CommitSummary, LedgerNode};
pub use pool::{Admission, TransactionPool};
pub use quorum::{AdvertOutcome, QuorumBuffer, quorum_threshold};
pub use store::{AppendOutcome, ChainStore};
pub use validation::BlockValidity;

// Re-export signing interfaces.
pub use signer::{Ed25519Authority, KeyError, Signer, public_key_from_pem, verify};

// Re-export the gossip protocol and its HTTP transport.
pub use gossip::{
    BlockAdvert, BlockRequest, ChainDump, GossipCoordinator, HttpPeerClient, PeerClient,
    PeerError, RegisterRequest, RegisterResponse, TransactionAdvert, TransactionAdvertReply,
};

// Re-export metrics registry and ledger metrics.
pub use metrics::{LedgerMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the node stack used by a "typical" deployment: an
/// Ed25519 authority key signing blocks, gossiping over HTTP.
pub type DefaultLedgerNode = LedgerNode<Ed25519Authority>;

/// Type alias for the default gossip stack.
pub type DefaultGossip = GossipCoordinator<HttpPeerClient>;
