//! Vote attempt orchestration
//!
//! One attempt signs in, asks the order service for a vote order, turns its
//! payment parameters into a signed `feed` transaction, broadcasts it, waits
//! for the receipt and reports the hash back. Nothing is shared between
//! attempts: each queries its own nonce and fees and runs its own poll.

use crate::abi::feed::checked_amount;
use crate::abi::{CallVariant, EncodedCall, FeedCall};
use crate::chain::ChainRpc;
use crate::config::{ChainConfig, VoterConfig};
use crate::error::{VoterError, VoterResult};
use crate::order::{CreateOrderRequest, OrderData, OrderService};
use crate::tx::{Broadcaster, ConfirmationPoller, FeeStrategy, TransactionAssembler};
use crate::wallet::Wallet;

use ethers::types::{Address, H256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A vote that was mined successfully and reported to the order service
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub order_id: String,
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

pub struct VoteRunner<R: ChainRpc, O: OrderService> {
    rpc: Arc<R>,
    orders: Arc<O>,
    wallet: Wallet,
    voter: VoterConfig,
    chain: ChainConfig,
    fees: FeeStrategy,
    poller: ConfirmationPoller,
}

impl<R: ChainRpc, O: OrderService> VoteRunner<R, O> {
    pub fn new(
        rpc: Arc<R>,
        orders: Arc<O>,
        wallet: Wallet,
        voter: VoterConfig,
        chain: ChainConfig,
    ) -> Self {
        let fees = FeeStrategy::from_config(&chain);
        let poller = ConfirmationPoller::from_config(&chain);
        Self {
            rpc,
            orders,
            wallet,
            voter,
            chain,
            fees,
            poller,
        }
    }

    /// Run attempts until one succeeds, a non-retryable error occurs or the
    /// attempt budget is spent
    pub async fn run(&self) -> VoterResult<VoteOutcome> {
        let max_attempts = self.voter.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            info!("Vote attempt {}/{}", attempt, max_attempts);

            let result = self.attempt().await;
            if let Err(e) = &result {
                crate::metrics::record_tx_failed(self.chain.chain_id, e.stage());
            }

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        "Attempt {}/{} failed before broadcast, retrying in {}s: {}",
                        attempt, max_attempts, self.voter.delay_secs, e
                    );
                    tokio::time::sleep(Duration::from_secs(self.voter.delay_secs)).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_outcome_unknown() {
                        warn!("Vote outcome unknown, not retrying: {}", e);
                    } else {
                        error!("Vote attempt {} failed: {}", attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// A single vote attempt
    pub async fn attempt(&self) -> VoterResult<VoteOutcome> {
        crate::metrics::record_vote_attempt(self.chain.chain_id);

        let token = self.orders.sign_in(&self.wallet).await?;
        let order = self.orders.create_order(&token, &self.order_request()).await?;
        info!(
            "Created vote order {} ({}) for contract {}",
            order.order.id, order.order.status, order.payment.contract_address
        );

        if let Some(chain_id) = order.payment.chain_id {
            if chain_id != self.chain.chain_id {
                return Err(VoterError::InvalidInput(format!(
                    "Order targets chain {} but the voter is configured for chain {}",
                    chain_id, self.chain.chain_id
                )));
            }
        }

        let contract = order.payment.contract()?;
        let data = self.feed_call(&order)?.encode()?;
        let tx_hash = self.submit(contract, data).await?;
        let tx_hash_hex = format!("{:?}", tx_hash);

        let receipt = match self.poller.wait(self.rpc.as_ref(), tx_hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if e.is_outcome_unknown() {
                    self.log_order_status(&token, &order.order.id, &tx_hash_hex).await;
                }
                return Err(e);
            }
        };
        if !receipt.succeeded() {
            crate::metrics::record_tx_reverted(self.chain.chain_id);
            return Err(VoterError::Reverted {
                tx_hash: tx_hash_hex,
                block_number: receipt.block_number,
            });
        }
        crate::metrics::record_tx_confirmed(self.chain.chain_id);

        self.orders
            .confirm_order(&token, &order.order.id, &tx_hash_hex)
            .await
            .map_err(|e| VoterError::ConfirmReport {
                tx_hash: tx_hash_hex.clone(),
                message: e.to_string(),
            })?;

        info!("Vote {} confirmed in block {:?}", tx_hash_hex, receipt.block_number);

        Ok(VoteOutcome {
            order_id: order.order.id,
            tx_hash,
            block_number: receipt.block_number,
        })
    }

    /// Assemble, sign and broadcast a call to `contract`
    pub async fn submit(&self, contract: Address, data: EncodedCall) -> VoterResult<H256> {
        let rpc = self.rpc.as_ref();
        let signer = self.wallet.transaction_signer();

        let unsigned = TransactionAssembler::new(rpc, &self.fees, self.chain.chain_id)
            .assemble(signer.address(), contract, data)
            .await?;
        let signed = signer.sign(unsigned)?;

        Broadcaster::new(rpc, self.chain.chain_id)
            .broadcast(signed)
            .await
    }

    /// Ask the service what it knows about an order whose transaction could not be observed
    async fn log_order_status(&self, token: &str, order_id: &str, tx_hash: &str) {
        match self.orders.get_order(token, order_id).await {
            Ok(order) => warn!(
                "Order {} is {} while the outcome of {} is unknown",
                order.id, order.status, tx_hash
            ),
            Err(e) => warn!("Could not look up order {}: {}", order_id, e),
        }
    }

    fn order_request(&self) -> CreateOrderRequest {
        CreateOrderRequest {
            candidate_id: self.voter.candidate_id.clone(),
            chain_id: self.chain.chain_id.to_string(),
            country_id: self.voter.target_country_id.clone(),
            rpc_url: self.chain.rpc_url.clone(),
            wallet_id: self.voter.wallet_id.clone(),
            feed_amount: self.voter.feed_amount,
        }
    }

    fn feed_call(&self, order: &OrderData) -> VoterResult<FeedCall> {
        let params = &order.payment.params;
        let candidate_id = self.voter.candidate_id.as_str();

        Ok(match self.voter.call_variant {
            CallVariant::Full => FeedCall::Full(params.call_parameters(candidate_id)?),
            CallVariant::Simple => FeedCall::Simple {
                candidate_id: candidate_id.to_string(),
                amount: checked_amount(params.feed_amount)?,
            },
        })
    }
}
