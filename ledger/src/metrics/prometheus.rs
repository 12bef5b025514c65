//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed ledger metrics, and an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Ledger-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and can be updated from the
/// admission / commit paths.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Transactions admitted into the pool (dedup hits excluded).
    pub transactions_admitted: IntCounter,
    /// Transactions deduplicated on re-submission.
    pub transactions_deduped: IntCounter,
    /// Blocks committed to the chain (own proposals and peer blocks).
    pub blocks_committed: IntCounter,
    /// Peer blocks rejected during validation or append.
    pub blocks_rejected: IntCounter,
    /// Current height of the committed chain tip.
    pub chain_height: IntGauge,
    /// Latency of full block validation, in seconds.
    pub block_validation_seconds: Histogram,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let transactions_admitted = IntCounter::with_opts(Opts::new(
            "ledger_transactions_admitted",
            "Total number of vote transactions admitted into the pool",
        ))?;
        registry.register(Box::new(transactions_admitted.clone()))?;

        let transactions_deduped = IntCounter::with_opts(Opts::new(
            "ledger_transactions_deduped",
            "Total number of transaction submissions deduplicated by fingerprint",
        ))?;
        registry.register(Box::new(transactions_deduped.clone()))?;

        let blocks_committed = IntCounter::with_opts(Opts::new(
            "ledger_blocks_committed",
            "Total number of blocks appended to the local chain",
        ))?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "ledger_blocks_rejected",
            "Total number of peer blocks rejected during validation or append",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let chain_height = IntGauge::with_opts(Opts::new(
            "ledger_chain_height",
            "Height of the committed chain tip",
        ))?;
        registry.register(Box::new(chain_height.clone()))?;

        // Block validation latency.
        let block_validation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_block_validation_seconds",
                "Time to validate a peer block in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(block_validation_seconds.clone()))?;

        Ok(Self {
            transactions_admitted,
            transactions_deduped,
            blocks_committed,
            blocks_rejected,
            chain_height,
            block_validation_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the ledger metrics.
///
/// This is the main handle you pass around in the host. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("vote".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn ledger_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = LedgerMetrics::register(&registry).expect("register metrics");

        metrics.transactions_admitted.inc();
        metrics.blocks_committed.inc();
        metrics.chain_height.set(3);
        metrics.block_validation_seconds.observe(0.002);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.ledger.blocks_committed.inc();
        let text = registry.gather_text();
        assert!(text.contains("ledger_blocks_committed"));
    }
}
