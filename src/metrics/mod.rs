//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Vote attempts and their outcomes
//! - Transaction submission and confirmation
//! - Gas estimation fallbacks and receipt latency

use crate::error::{VoterError, VoterResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref VOTES_ATTEMPTED: CounterVec = register_counter_vec!(
        "feed_voter_vote_attempts_total",
        "Total vote attempts started",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "feed_voter_transactions_submitted_total",
        "Total transactions accepted by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "feed_voter_transactions_confirmed_total",
        "Total transactions mined with success status",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_REVERTED: CounterVec = register_counter_vec!(
        "feed_voter_transactions_reverted_total",
        "Total transactions mined with failure status",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "feed_voter_transactions_failed_total",
        "Total vote attempts failed, by stage",
        &["chain_id", "stage"]
    ).unwrap();

    pub static ref GAS_FALLBACKS: CounterVec = register_counter_vec!(
        "feed_voter_gas_estimate_fallbacks_total",
        "Gas estimations that failed and used the floor limit",
        &["chain_id"]
    ).unwrap();

    pub static ref RECEIPT_LATENCY: HistogramVec = register_histogram_vec!(
        "feed_voter_receipt_latency_seconds",
        "Time from broadcast to receipt",
        &["chain_id"],
        vec![0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> VoterResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| VoterError::Config(format!("Cannot bind metrics port {}: {}", self.port, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| VoterError::Config(format!("Metrics server stopped: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_vote_attempt(chain_id: u64) {
    VOTES_ATTEMPTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_confirmed(chain_id: u64) {
    TX_CONFIRMED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_reverted(chain_id: u64) {
    TX_REVERTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_failed(chain_id: u64, stage: &str) {
    TX_FAILED
        .with_label_values(&[&chain_id.to_string(), stage])
        .inc();
}

pub fn record_gas_fallback(chain_id: u64) {
    GAS_FALLBACKS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_receipt_latency(chain_id: u64, latency_secs: f64) {
    RECEIPT_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}
