//! Top-level configuration for a ledger node.
//!
//! This module aggregates configuration for:
//!
//! - node identity (local id and advertised peer address),
//! - the outbound peer HTTP client (timeout),
//! - the Prometheus metrics exporter (enable flag + listen address).
//!
//! Key material is deliberately *not* configured here as values; hosts
//! load PEM files themselves and hand the resulting signer and
//! verifying key to the node (the engine never generates or stores
//! keys).

use std::net::SocketAddr;
use std::time::Duration;

use crate::types::PeerAddr;

/// Identity of the local node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Short identifier used as the prefix of locally issued
    /// transaction ids, conventionally the listen port.
    pub node_id: String,
    /// Address other peers can reach this node at.
    pub self_address: PeerAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "7001".to_string(),
            self_address: PeerAddr("http://127.0.0.1:7001".to_string()),
        }
    }
}

/// Configuration for the outbound peer HTTP client.
#[derive(Clone, Debug)]
pub struct PeerClientConfig {
    /// Per-request timeout for advertise / fetch / push calls.
    pub timeout: Duration,
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a ledger node.
#[derive(Clone, Debug, Default)]
pub struct LedgerConfig {
    pub node: NodeConfig,
    pub peer_client: PeerClientConfig,
    pub metrics: MetricsConfig,
}
