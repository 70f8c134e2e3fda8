//! Feed Voter - signs, submits and confirms feed vote transactions
//!
//! The voter signs in to the order service with its wallet, takes a vote
//! order carrying the payment parameters, and turns them into a `feed` call
//! on the order's contract. Once the transaction is mined the hash is
//! reported back to the service.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod abi;
mod chain;
mod config;
mod error;
mod metrics;
mod order;
mod tx;
mod vote;
mod wallet;

use chain::ChainProvider;
use config::Settings;
use error::VoterResult;
use metrics::MetricsServer;
use order::OrderClient;
use vote::{VoteOutcome, VoteRunner};
use wallet::Wallet;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Feed Voter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({}), fee mode {:?}, {:?} call",
        settings.chain.name,
        settings.chain.chain_id,
        settings.chain.fee_mode,
        settings.voter.call_variant
    );

    let private_key = settings
        .private_key()
        .with_context(|| format!("{} is not set", settings.wallet.private_key_env))?;
    info!("Private key loaded from {}", settings.wallet.private_key_env);

    let wallet = Wallet::from_private_key(&private_key)?;
    info!("Voting from wallet {}", wallet.checksum_address());

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let provider = Arc::new(ChainProvider::new(&settings.chain)?);
    info!(
        "Chain {} connection via {}",
        provider.chain_id(),
        provider.endpoint()
    );
    let orders = Arc::new(OrderClient::new(&settings.api)?);

    let runner = VoteRunner::new(
        provider,
        orders,
        wallet,
        settings.voter.clone(),
        settings.chain.clone(),
    );

    let result = tokio::select! {
        outcome = runner.run() => Some(outcome),
        _ = shutdown_signal() => None,
    };

    if let Some(h) = metrics_handle {
        h.abort();
    }

    finish(result)
}

/// Map the vote result to the process exit. `None` means a shutdown signal
/// interrupted the attempt.
fn finish(result: Option<VoterResult<VoteOutcome>>) -> Result<()> {
    match result {
        Some(Ok(outcome)) => {
            info!(
                "Vote for order {} confirmed: {:?} in block {:?}",
                outcome.order_id, outcome.tx_hash, outcome.block_number
            );
            Ok(())
        }
        Some(Err(e)) => {
            if e.is_outcome_unknown() {
                warn!("Check the transaction manually before voting again");
            }
            Err(e.into())
        }
        None => {
            warn!("Shutdown signal received, vote attempt abandoned");
            warn!("Check any transaction hash logged above before voting again");
            anyhow::bail!("vote attempt interrupted, outcome of any broadcast transaction is unknown")
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,feed_voter=debug,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
