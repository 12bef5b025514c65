//! Gateway configuration.
//!
//! Everything a node needs to come up: the HTTP listen address, how it
//! advertises itself to peers, an optional bootstrap peer to join, the
//! proposal loop interval, and optional paths to PEM key material.
//!
//! Values are read from environment variables with sensible single-node
//! defaults, so `cargo run` starts a working node and a multi-node
//! setup only needs a handful of overrides:
//!
//! - `LEDGER_LISTEN`: socket address to bind (default `0.0.0.0:7001`)
//! - `LEDGER_SELF_ADDR`: address peers reach this node at
//! - `LEDGER_BOOTSTRAP`: existing node to join on startup
//! - `LEDGER_PROPOSE_INTERVAL`: proposal loop interval in seconds
//! - `LEDGER_SIGNING_KEY`: path to a PKCS#8 PEM Ed25519 signing key
//! - `LEDGER_AUTHORITY_KEY`: path to the authority public key PEM

use std::net::SocketAddr;

use ledger::PeerAddr;

/// Configuration for the gateway HTTP server and node identity.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Short node identifier, used as the prefix of local tx ids.
    pub node_id: String,
    /// Address other peers can reach this node at.
    pub self_address: PeerAddr,
    /// Existing node to register with and sync from on startup.
    pub bootstrap: Option<PeerAddr>,
    /// Interval of the background proposal loop, in seconds.
    pub propose_interval_secs: u64,
    /// Path to the authority signing key (PKCS#8 PEM). When unset, a
    /// fixed development key is derived instead.
    pub signing_key_path: Option<String>,
    /// Path to the authority public key PEM every node verifies block
    /// proofs against. Defaults to the signing key's public half.
    pub authority_key_path: Option<String>,
}

impl GatewayConfig {
    /// Builds a configuration from environment variables, falling back
    /// to single-node defaults.
    pub fn from_env() -> Result<Self, String> {
        let listen_addr: SocketAddr = match std::env::var("LEDGER_LISTEN") {
            Ok(v) => v
                .parse()
                .map_err(|e| format!("invalid LEDGER_LISTEN {v:?}: {e}"))?,
            Err(_) => "0.0.0.0:7001"
                .parse()
                .expect("hard-coded listen address should parse"),
        };

        let node_id = listen_addr.port().to_string();

        let self_address = match std::env::var("LEDGER_SELF_ADDR") {
            Ok(v) => PeerAddr(v).normalized(),
            Err(_) => PeerAddr(format!("http://127.0.0.1:{}", listen_addr.port())),
        };

        let bootstrap = std::env::var("LEDGER_BOOTSTRAP")
            .ok()
            .map(|v| PeerAddr(v).normalized());

        let propose_interval_secs = match std::env::var("LEDGER_PROPOSE_INTERVAL") {
            Ok(v) => v
                .parse()
                .map_err(|e| format!("invalid LEDGER_PROPOSE_INTERVAL {v:?}: {e}"))?,
            Err(_) => 10,
        };

        Ok(Self {
            listen_addr,
            node_id,
            self_address,
            bootstrap,
            propose_interval_secs,
            signing_key_path: std::env::var("LEDGER_SIGNING_KEY").ok(),
            authority_key_path: std::env::var("LEDGER_AUTHORITY_KEY").ok(),
        })
    }
}
