use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ledger::{PublicKey, Signature, Transaction, TransactionAdvert, TransactionAdvertReply, TxId};

use crate::state::SharedState;

/// Request body for `POST /transactions`.
///
/// Matches the [`Transaction`] wire shape except that the timestamp may
/// be omitted; the node fills in its own clock then. The voter
/// signature covers only the vote payload, so this is safe.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub public_key: PublicKey,
    pub vote: String,
    pub signature: Signature,
    pub timestamp: Option<u64>,
}

/// Response body for `POST /transactions`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub transaction_id: String,
    pub status: &'static str,
}

/// `POST /transactions`
///
/// Admits a signed vote transaction into the local pool and, if it is
/// new, broadcasts it to the current peer set. Re-submissions (and
/// gossip echoes) of a known vote are deduplicated by fingerprint and
/// return the existing id.
pub async fn submit(
    State(state): State<SharedState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, String)> {
    let tx = Transaction {
        public_key: req.public_key,
        vote: req.vote,
        signature: req.signature,
        timestamp: req.timestamp.unwrap_or_else(crate::current_unix_timestamp),
    };

    let (admission, peers) = {
        let mut node = state.node.lock().await;
        let admission = node
            .submit_transaction(tx.clone())
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        let peers = if admission.is_new {
            state.metrics.ledger.transactions_admitted.inc();
            node.peers()
        } else {
            state.metrics.ledger.transactions_deduped.inc();
            Vec::new()
        };
        (admission, peers)
    };

    if admission.is_new && !peers.is_empty() {
        let gossip = state.gossip.clone();
        let id = admission.id.clone();
        tokio::task::spawn_blocking(move || {
            gossip.broadcast_transaction(&peers, &id, &tx);
        });
    }

    let status = if admission.is_new { "admitted" } else { "known" };
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            transaction_id: admission.id.to_string(),
            status,
        }),
    ))
}

/// `POST /transactions/advertise`
///
/// A peer announces a transaction id; the reply says whether this node
/// wants the full payload pushed to it (i.e. the id is not yet pooled).
pub async fn advertise(
    State(state): State<SharedState>,
    Json(advert): Json<TransactionAdvert>,
) -> (StatusCode, Json<TransactionAdvertReply>) {
    let node = state.node.lock().await;
    let reply = TransactionAdvertReply {
        requested: node.transaction_requested(&advert.transaction_id),
        peer: node.self_address().clone(),
    };
    (StatusCode::OK, Json(reply))
}

/// `GET /transactions`
///
/// Lists the current pool contents, keyed by local transaction id.
pub async fn list(
    State(state): State<SharedState>,
) -> (StatusCode, Json<BTreeMap<TxId, Transaction>>) {
    let snapshot = state.node.lock().await.pool_snapshot();
    (StatusCode::OK, Json(snapshot))
}
