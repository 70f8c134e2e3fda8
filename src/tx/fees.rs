//! Fee terms and gas limit selection

use crate::chain::ChainRpc;
use crate::config::{ChainConfig, FeeMode};
use crate::error::VoterResult;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::{debug, warn};

/// Lowest gas limit ever attached to a vote
pub const GAS_LIMIT_FLOOR: u64 = 100_000;

/// Headroom added on top of a successful estimate
pub const GAS_LIMIT_MARGIN_PERCENT: u64 = 10;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Price terms for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTerms {
    Legacy {
        gas_price: U256,
    },
    Capped {
        max_priority_fee_per_gas: U256,
        max_fee_per_gas: U256,
    },
}

impl FeeTerms {
    /// Capped terms paying `priority_fee` on top of the sampled base fee
    pub fn capped(base_fee: U256, priority_fee: U256) -> Self {
        FeeTerms::Capped {
            max_priority_fee_per_gas: priority_fee,
            max_fee_per_gas: base_fee.saturating_add(priority_fee),
        }
    }

    /// Worst-case cost in wei for `gas_limit`
    pub fn max_cost(&self, gas_limit: U256) -> U256 {
        match self {
            FeeTerms::Legacy { gas_price } => gas_limit.saturating_mul(*gas_price),
            FeeTerms::Capped {
                max_fee_per_gas, ..
            } => gas_limit.saturating_mul(*max_fee_per_gas),
        }
    }
}

/// `max(estimate * 110 / 100, GAS_LIMIT_FLOOR)`
pub fn apply_gas_margin(estimate: U256) -> U256 {
    let padded =
        estimate.saturating_mul(U256::from(100 + GAS_LIMIT_MARGIN_PERCENT)) / U256::from(100);
    padded.max(U256::from(GAS_LIMIT_FLOOR))
}

/// Chooses fee terms and gas limits for a chain
#[derive(Debug, Clone)]
pub struct FeeStrategy {
    chain_id: u64,
    mode: FeeMode,
    /// Priority fee in wei
    priority_fee: U256,
}

impl FeeStrategy {
    pub fn new(chain_id: u64, mode: FeeMode, priority_fee_gwei: u64) -> Self {
        Self {
            chain_id,
            mode,
            priority_fee: U256::from(priority_fee_gwei) * U256::from(WEI_PER_GWEI),
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.chain_id, config.fee_mode, config.priority_fee_gwei)
    }

    /// Sample the network and price a transaction.
    ///
    /// A failed fee query is fatal: nothing can be priced safely without it.
    pub async fn fee_terms<R: ChainRpc + ?Sized>(&self, rpc: &R) -> VoterResult<FeeTerms> {
        let terms = match self.mode {
            FeeMode::Legacy => FeeTerms::Legacy {
                gas_price: rpc.gas_price().await?,
            },
            FeeMode::Eip1559 => {
                let base_fee = rpc.base_fee().await?;
                FeeTerms::capped(base_fee, self.priority_fee)
            }
        };

        debug!("Fee terms for chain {}: {:?}", self.chain_id, terms);
        Ok(terms)
    }

    /// Gas limit for `tx`, falling back to the floor when estimation fails
    pub async fn gas_limit<R: ChainRpc + ?Sized>(&self, rpc: &R, tx: &TypedTransaction) -> U256 {
        match rpc.estimate_gas(tx).await {
            Ok(estimate) => {
                let limit = apply_gas_margin(estimate);
                debug!(
                    "Gas estimate on chain {}: {} -> limit {}",
                    self.chain_id, estimate, limit
                );
                limit
            }
            Err(e) => {
                warn!(
                    "Gas estimation failed on chain {}, using floor {}: {}",
                    self.chain_id, GAS_LIMIT_FLOOR, e
                );
                crate::metrics::record_gas_fallback(self.chain_id);
                U256::from(GAS_LIMIT_FLOOR)
            }
        }
    }
}
