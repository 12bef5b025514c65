use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use ledger::{PeerAddr, RegisterRequest, RegisterResponse};

use crate::state::SharedState;

/// Request body for `POST /peers/join`.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// An existing node of the network to register with and sync from.
    pub peer: PeerAddr,
}

/// Response body for `POST /peers/join`.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub status: &'static str,
    /// Chain height after adopting the peer's dump.
    pub height: u64,
}

/// `POST /peers/register`
///
/// An inbound registration from a joining node. The joiner is added to
/// the peer set and handed everything it needs to catch up: the full
/// chain dump and the rest of the known peers.
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let joiner = req.node_address.normalized();

    let mut node = state.node.lock().await;
    if node.register_peer(joiner.clone()) {
        tracing::info!(peer = %joiner, peers = node.peers().len(), "peer registered");
    }

    let chain = node.chain_dump();
    let resp = RegisterResponse {
        length: chain.len(),
        chain,
        peers: node.peers_except(Some(&joiner)),
    };
    (StatusCode::OK, Json(resp))
}

/// `POST /peers/join`
///
/// Instructs *this* node to join an existing network: register with the
/// given peer, adopt its chain dump, and introduce itself to every peer
/// learned from the response.
pub async fn join(
    State(state): State<SharedState>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), (StatusCode, String)> {
    let height = join_network(&state, &req.peer).await?;
    Ok((
        StatusCode::OK,
        Json(JoinResponse {
            status: "synced",
            height,
        }),
    ))
}

/// `GET /peers`
///
/// Lists the peer addresses this node currently knows.
pub async fn list(State(state): State<SharedState>) -> (StatusCode, Json<Vec<PeerAddr>>) {
    let peers = state.node.lock().await.peers();
    (StatusCode::OK, Json(peers))
}

/// The join flow shared by the route and startup bootstrap: register
/// with `target`, adopt its chain, merge its peer list, then introduce
/// this node to the newly learned peers (best effort).
///
/// Returns the chain height after adoption.
pub(crate) async fn join_network(
    state: &SharedState,
    target: &PeerAddr,
) -> Result<u64, (StatusCode, String)> {
    let target = target.normalized();

    let gossip = state.gossip.clone();
    let register_target = target.clone();
    let resp = tokio::task::spawn_blocking(move || gossip.register_with(&register_target))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("registration task failed: {e}"),
            )
        })?
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                format!("registration with {target} failed: {e}"),
            )
        })?;

    let (height, learned) = {
        let mut node = state.node.lock().await;
        node.register_peer(target.clone());
        node.merge_peers(resp.peers);
        node.adopt_chain(resp.chain)
            .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

        let height = node.tip_index();
        state.metrics.ledger.chain_height.set(height as i64);
        (height, node.peers_except(Some(&target)))
    };

    tracing::info!(peer = %target, height, "joined network and adopted chain");

    if !learned.is_empty() {
        let gossip = state.gossip.clone();
        tokio::task::spawn_blocking(move || {
            for peer in learned {
                if let Err(e) = gossip.register_with(&peer) {
                    tracing::warn!(peer = %peer, error = %e, "introduction to learned peer failed");
                }
            }
        });
    }

    Ok(height)
}
