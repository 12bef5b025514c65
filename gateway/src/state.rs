//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use ledger::{DefaultGossip, DefaultLedgerNode, MetricsRegistry};

/// Shared state held by the API and background tasks.
///
/// The ledger node is the single synchronization boundary: every
/// handler locks it, applies one state transition, computes whatever
/// outbound traffic that transition implies, and releases the lock
/// *before* any network call is made. The gossip coordinator's client
/// is blocking, so outbound calls run under `spawn_blocking`.
pub struct AppState {
    /// The ledger state machine (pool, chain, quorum buffer, peers).
    pub node: Mutex<DefaultLedgerNode>,
    /// Outbound gossip fan-out over the HTTP peer client.
    pub gossip: Arc<DefaultGossip>,
    /// Metrics registry shared between the node and the exporter.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
