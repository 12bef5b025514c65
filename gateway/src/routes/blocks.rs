use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use ledger::{
    AdvertDisposition, BlockAdvert, BlockRequest, ChainDump, DefaultLedgerNode, MetricsRegistry,
    types::Block,
};

use crate::state::SharedState;

/// Response body for `POST /blocks/propose`.
#[derive(Debug, Serialize)]
pub struct ProposeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
}

/// Response body for `POST /blocks/advertise`.
#[derive(Debug, Serialize)]
pub struct AdvertiseResponse {
    pub status: &'static str,
}

/// `POST /blocks/propose`
///
/// Assembles a block from the current pool, commits it locally, and
/// advertises it to every peer. The background proposal loop drives the
/// same path on a timer; this endpoint exists to force a round.
pub async fn propose(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<ProposeResponse>), (StatusCode, String)> {
    let timestamp = crate::current_unix_timestamp();

    let (block, peers) = {
        let mut node = state.node.lock().await;
        match node.propose_block(timestamp) {
            Ok(Some(block)) => {
                state.metrics.ledger.blocks_committed.inc();
                state.metrics.ledger.chain_height.set(node.tip_index() as i64);
                (Some(block), node.peers())
            }
            Ok(None) => (None, Vec::new()),
            Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        }
    };

    let Some(block) = block else {
        return Ok((
            StatusCode::OK,
            Json(ProposeResponse {
                status: "empty-pool",
                block: None,
            }),
        ));
    };

    tracing::info!(height = block.index, hash = %block.hash, "proposed block");

    if !peers.is_empty() {
        let gossip = state.gossip.clone();
        let index = block.index;
        tokio::task::spawn_blocking(move || {
            gossip.advertise_block(&peers, index);
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(ProposeResponse {
            status: "committed",
            block: Some(block),
        }),
    ))
}

/// `POST /blocks/advertise`
///
/// Handles a peer's block announcement:
///
/// - a height at or below the local tip is a stale no-op,
/// - the first announcement of a new height triggers a fetch from the
///   advertiser, validation, buffering, and a re-broadcast to the rest
///   of the peer set,
/// - repeat announcements from other peers accrue acknowledgements and
///   commit the buffered candidate once a majority is reached.
///
/// All outbound calls happen after the node lock is released.
pub async fn advertise(
    State(state): State<SharedState>,
    Json(advert): Json<BlockAdvert>,
) -> (StatusCode, Json<AdvertiseResponse>) {
    let source = advert.peer.normalized();
    let index = advert.block_id;

    let disposition = {
        let mut node = state.node.lock().await;
        node.observe_block_advertisement(index, &source)
    };

    let status = match disposition {
        AdvertDisposition::Stale => "stale",
        AdvertDisposition::Counted { quorum_reached } => {
            if quorum_reached {
                let mut node = state.node.lock().await;
                apply_commit(&mut node, &state.metrics, index);
            }
            "counted"
        }
        AdvertDisposition::NeedFetch => {
            // Fetch outside the lock; the blocking client runs on the
            // blocking thread pool.
            let gossip = state.gossip.clone();
            let fetch_from = source.clone();
            let fetched =
                tokio::task::spawn_blocking(move || gossip.fetch_block(&fetch_from, index)).await;

            let block = match fetched {
                Ok(Ok(block)) => block,
                Ok(Err(e)) => {
                    tracing::warn!(peer = %source, index, error = %e, "block fetch failed");
                    return (
                        StatusCode::OK,
                        Json(AdvertiseResponse {
                            status: "fetch-failed",
                        }),
                    );
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "block fetch task failed");
                    return (
                        StatusCode::OK,
                        Json(AdvertiseResponse {
                            status: "fetch-failed",
                        }),
                    );
                }
            };

            let (status, peers) = {
                let mut node = state.node.lock().await;
                let started = std::time::Instant::now();
                match node.record_fetched_block(index, block, &source) {
                    Ok(quorum_reached) => {
                        state
                            .metrics
                            .ledger
                            .block_validation_seconds
                            .observe(started.elapsed().as_secs_f64());
                        if quorum_reached {
                            apply_commit(&mut node, &state.metrics, index);
                        }
                        // Pass the announcement along, minus the peer we
                        // learned it from.
                        ("buffered", node.peers_except(Some(&source)))
                    }
                    Err(e) => {
                        state.metrics.ledger.blocks_rejected.inc();
                        tracing::warn!(peer = %source, index, error = %e, "fetched block rejected");
                        ("rejected", Vec::new())
                    }
                }
            };

            if !peers.is_empty() {
                let gossip = state.gossip.clone();
                tokio::task::spawn_blocking(move || {
                    gossip.advertise_block(&peers, index);
                });
            }
            status
        }
    };

    (StatusCode::OK, Json(AdvertiseResponse { status }))
}

/// `POST /blocks/request`
///
/// Serves a full block by height: committed blocks first, then buffered
/// candidates this node is itself still accruing quorum for.
pub async fn request(
    State(state): State<SharedState>,
    Json(req): Json<BlockRequest>,
) -> Result<Json<Block>, (StatusCode, String)> {
    let node = state.node.lock().await;
    match node.block_for_request(req.block_id) {
        Some(block) => Ok(Json(block)),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no block at height {}", req.block_id),
        )),
    }
}

/// `GET /chain`
///
/// Returns the full committed chain in canonical order, the dump a
/// bootstrapping peer replays.
pub async fn chain(State(state): State<SharedState>) -> (StatusCode, Json<ChainDump>) {
    let chain = state.node.lock().await.chain_dump();
    (
        StatusCode::OK,
        Json(ChainDump {
            length: chain.len(),
            chain,
        }),
    )
}

/// Commits whatever is ready at `index` (plus any cascade) and updates
/// the commit metrics.
pub(crate) fn apply_commit(node: &mut DefaultLedgerNode, metrics: &MetricsRegistry, index: u64) {
    match node.commit_ready(index) {
        Ok(summary) if !summary.committed.is_empty() => {
            metrics
                .ledger
                .blocks_committed
                .inc_by(summary.committed.len() as u64);
            metrics.ledger.chain_height.set(node.tip_index() as i64);
            tracing::info!(committed = ?summary.committed, height = node.tip_index(), "committed peer blocks");
        }
        Ok(_) => {}
        Err(e) => {
            metrics.ledger.blocks_rejected.inc();
            tracing::warn!(index, error = %e, "quorum candidate rejected at commit");
        }
    }
}
