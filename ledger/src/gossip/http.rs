//! HTTP-based peer transport.
//!
//! This implementation of [`PeerClient`] talks to other ledger nodes
//! over their JSON HTTP API:
//!
//! - `POST {peer}/transactions/advertise`: [`TransactionAdvert`] →
//!   [`TransactionAdvertReply`]
//! - `POST {peer}/transactions`: full [`Transaction`] push
//! - `POST {peer}/blocks/advertise`: [`BlockAdvert`]
//! - `POST {peer}/blocks/request`: [`BlockRequest`] → [`Block`]
//! - `POST {peer}/peers/register`: [`RegisterRequest`] →
//!   [`RegisterResponse`]
//!
//! The client is blocking and thread-safe (`Send + Sync`); async hosts
//! should wrap calls in dedicated threads or `spawn_blocking` tasks.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{Block, PeerAddr, Transaction};

use super::{
    BlockAdvert, BlockRequest, PeerClient, PeerError, RegisterRequest, RegisterResponse,
    TransactionAdvert, TransactionAdvertReply,
};

/// Blocking HTTP implementation of [`PeerClient`].
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    /// Constructs a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn endpoint(peer: &PeerAddr, path: &str) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/{}",
            peer.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        peer: &PeerAddr,
        path: &str,
        body: &B,
    ) -> Result<R, PeerError> {
        let url = Self::endpoint(peer, path);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| PeerError::Transport(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PeerError::Transport(format!(
                "peer returned HTTP status {status} for {url}"
            )));
        }

        resp.json::<R>()
            .map_err(|e| PeerError::Protocol(format!("failed to parse JSON response: {e}")))
    }
}

impl PeerClient for HttpPeerClient {
    fn advertise_transaction(
        &self,
        peer: &PeerAddr,
        advert: &TransactionAdvert,
    ) -> Result<TransactionAdvertReply, PeerError> {
        self.post_json(peer, "/transactions/advertise", advert)
    }

    fn push_transaction(&self, peer: &PeerAddr, tx: &Transaction) -> Result<(), PeerError> {
        // The peer replies with its admission record; only delivery
        // matters here, the body is discarded.
        let _: serde_json::Value = self.post_json(peer, "/transactions", tx)?;
        Ok(())
    }

    fn advertise_block(&self, peer: &PeerAddr, advert: &BlockAdvert) -> Result<(), PeerError> {
        let _: serde_json::Value = self.post_json(peer, "/blocks/advertise", advert)?;
        Ok(())
    }

    fn fetch_block(&self, peer: &PeerAddr, request: &BlockRequest) -> Result<Block, PeerError> {
        self.post_json(peer, "/blocks/request", request)
    }

    fn register(
        &self,
        peer: &PeerAddr,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, PeerError> {
        self.post_json(peer, "/peers/register", request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_join_avoids_double_slashes() {
        let peer = PeerAddr("http://localhost:7001/".to_string());
        assert_eq!(
            HttpPeerClient::endpoint(&peer, "/blocks/request"),
            "http://localhost:7001/blocks/request"
        );

        let bare = PeerAddr("http://localhost:7001".to_string());
        assert_eq!(
            HttpPeerClient::endpoint(&bare, "blocks/request"),
            "http://localhost:7001/blocks/request"
        );
    }

    #[test]
    fn advert_reply_wire_shape() {
        let json = r#"{"requested": true, "peer": "http://localhost:7002"}"#;
        let reply: TransactionAdvertReply = serde_json::from_str(json).expect("reply parses");
        assert!(reply.requested);
        assert_eq!(reply.peer.as_str(), "http://localhost:7002");
    }

    #[test]
    fn register_response_wire_shape() {
        let json = r#"{"length": 0, "chain": [], "peers": ["http://localhost:7003"]}"#;
        let resp: RegisterResponse = serde_json::from_str(json).expect("response parses");
        assert_eq!(resp.length, 0);
        assert!(resp.chain.is_empty());
        assert_eq!(resp.peers.len(), 1);
    }
}
