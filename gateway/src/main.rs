//! Ledger gateway binary.
//!
//! This binary exposes one vote ledger node over HTTP on top of the
//! `ledger` crate:
//!
//! - `GET  /health`, `GET /chain`, `GET /peers`, `GET /transactions`
//! - `POST /transactions`, `POST /transactions/advertise`
//! - `POST /blocks/propose`, `POST /blocks/advertise`, `POST /blocks/request`
//! - `POST /peers/register`, `POST /peers/join`
//!
//! It embeds a `DefaultLedgerNode` behind a mutex, a background block
//! proposal loop, HTTP gossip to the peer set, and a Prometheus metrics
//! exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use ledger::{
    Ed25519Authority, GossipCoordinator, Hash256, HttpPeerClient, LedgerNode, MetricsConfig,
    MetricsRegistry, NodeConfig, PeerClientConfig, Signer, public_key_from_pem,
    run_prometheus_http_server,
};

use config::GatewayConfig;
use routes::{blocks, health, network, transactions};
use state::{AppState, SharedState};

/// Fixed genesis timestamp: every node that shares the authority key
/// derives a byte-identical genesis block, so freshly started nodes can
/// gossip without a bootstrap sync.
const GENESIS_TIMESTAMP: u64 = 0;

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=info,ledger=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = GatewayConfig::from_env()?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let metrics_cfg = MetricsConfig::default();
    if metrics_cfg.enabled {
        let metrics_clone = metrics.clone();
        let addr = metrics_cfg.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Key material
    // ---------------------------

    let signer = match &cfg.signing_key_path {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read signing key {path}: {e}"))?;
            Ed25519Authority::from_pem(&pem)
                .map_err(|e| format!("failed to parse signing key {path}: {e}"))?
        }
        None => {
            tracing::warn!("no LEDGER_SIGNING_KEY set; using the built-in development key");
            Ed25519Authority::from_seed(*Hash256::compute(b"ledger-dev-authority").as_bytes())
        }
    };

    let authority = match &cfg.authority_key_path {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read authority key {path}: {e}"))?;
            public_key_from_pem(&pem)
                .map_err(|e| format!("failed to parse authority key {path}: {e}"))?
        }
        None => signer.public_key(),
    };

    // ---------------------------
    // Node + gossip
    // ---------------------------

    let node_cfg = NodeConfig {
        node_id: cfg.node_id.clone(),
        self_address: cfg.self_address.clone(),
    };
    let node = LedgerNode::new(node_cfg, signer, authority, GENESIS_TIMESTAMP);

    let peer_client = HttpPeerClient::new(PeerClientConfig::default().timeout)
        .map_err(|e| format!("failed to build peer HTTP client: {e}"))?;
    let gossip = Arc::new(GossipCoordinator::new(peer_client, cfg.self_address.clone()));

    let app_state: SharedState = Arc::new(AppState {
        node: tokio::sync::Mutex::new(node),
        gossip,
        metrics: metrics.clone(),
    });

    // ---------------------------
    // Bootstrap
    // ---------------------------

    if let Some(bootstrap) = &cfg.bootstrap {
        match network::join_network(&app_state, bootstrap).await {
            Ok(height) => tracing::info!(peer = %bootstrap, height, "bootstrap sync complete"),
            Err((_, e)) => tracing::warn!(peer = %bootstrap, error = %e, "bootstrap sync failed"),
        }
    }

    // ---------------------------
    // Proposal loop
    // ---------------------------

    let proposer_state = app_state.clone();
    let interval_secs = cfg.propose_interval_secs;
    tokio::spawn(async move {
        run_proposal_loop(proposer_state, interval_secs).await;
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/chain", get(blocks::chain))
        .route(
            "/transactions",
            post(transactions::submit).get(transactions::list),
        )
        .route("/transactions/advertise", post(transactions::advertise))
        .route("/blocks/propose", post(blocks::propose))
        .route("/blocks/advertise", post(blocks::advertise))
        .route("/blocks/request", post(blocks::request))
        .route("/peers", get(network::list))
        .route("/peers/register", post(network::register))
        .route("/peers/join", post(network::join))
        .with_state(app_state);

    tracing::info!("ledger node listening on http://{}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {e}"))?;

    Ok(())
}

/// Background proposal loop.
///
/// Periodically assembles a block from the pool, commits it locally,
/// and advertises it to the peer set. An empty pool skips the round.
async fn run_proposal_loop(state: SharedState, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs.max(1));
    tracing::info!("proposal loop running with interval {}s", interval.as_secs());

    loop {
        tokio::time::sleep(interval).await;

        let timestamp = current_unix_timestamp();
        let (block, peers) = {
            let mut node = state.node.lock().await;
            match node.propose_block(timestamp) {
                Ok(Some(block)) => {
                    state.metrics.ledger.blocks_committed.inc();
                    state.metrics.ledger.chain_height.set(node.tip_index() as i64);
                    (Some(block), node.peers())
                }
                Ok(None) => (None, Vec::new()),
                Err(e) => {
                    tracing::warn!("failed to propose block: {e}");
                    (None, Vec::new())
                }
            }
        };

        let Some(block) = block else { continue };
        tracing::info!(height = block.index, hash = %block.hash, "proposed block");

        if !peers.is_empty() {
            let gossip = state.gossip.clone();
            let index = block.index;
            tokio::task::spawn_blocking(move || {
                gossip.advertise_block(&peers, index);
            });
        }
    }
}

/// Returns the current wall-clock time as seconds since Unix epoch.
pub(crate) fn current_unix_timestamp() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
