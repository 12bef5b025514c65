use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Simple health-check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Height of the committed chain tip.
    pub height: u64,
}

/// `GET /health`
///
/// Returns a basic JSON document indicating liveness and chain height.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let height = state.node.lock().await.tip_index();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            height,
        }),
    )
}
