//! JSON-RPC chain provider

use super::ChainRpc;
use crate::config::ChainConfig;
use crate::error::{RejectReason, VoterError, VoterResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::debug;

/// HTTP JSON-RPC endpoint for a single chain
pub struct ChainProvider {
    /// Chain ID the endpoint is expected to serve
    chain_id: u64,
    /// Endpoint URL, kept for error context
    endpoint: String,
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: &ChainConfig) -> VoterResult<Self> {
        let http = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| VoterError::Config(format!("Invalid RPC URL {}: {}", config.rpc_url, e)))?
            .interval(Duration::from_millis(100));

        debug!(
            "Added HTTP provider for chain {}: {}",
            config.chain_id, config.rpc_url
        );

        Ok(Self {
            chain_id: config.chain_id,
            endpoint: config.rpc_url.clone(),
            http,
        })
    }

    /// Get chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fee_error(&self, message: impl ToString) -> VoterError {
        VoterError::FeeQuery {
            endpoint: self.endpoint.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    async fn pending_nonce(&self, address: Address) -> VoterResult<u64> {
        let nonce = self
            .http
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| VoterError::Nonce {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        Ok(nonce.as_u64())
    }

    async fn gas_price(&self) -> VoterResult<U256> {
        self.http
            .get_gas_price()
            .await
            .map_err(|e| self.fee_error(e))
    }

    async fn base_fee(&self) -> VoterResult<U256> {
        let block = self
            .http
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| self.fee_error(e))?
            .ok_or_else(|| self.fee_error("No latest block"))?;

        block
            .base_fee_per_gas
            .ok_or_else(|| self.fee_error("No base fee in block"))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> VoterResult<U256> {
        self.http
            .estimate_gas(tx, None)
            .await
            .map_err(|e| VoterError::GasEstimation(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> VoterResult<H256> {
        let pending = self
            .http
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                let message = e.to_string();
                VoterError::Broadcast {
                    endpoint: self.endpoint.clone(),
                    reason: RejectReason::classify(&message),
                    message,
                }
            })?;

        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> VoterResult<Option<TransactionReceipt>> {
        self.http
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| VoterError::PollTransport {
                tx_hash: format!("{:?}", tx_hash),
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })
    }
}
