//! Chain module - the network capabilities a vote attempt relies on
//!
//! A vote needs exactly five things from a node: the sender's pending nonce,
//! current fee levels, a gas estimate, raw transaction submission and receipt
//! lookup. Anything answering those satisfies [`ChainRpc`].

pub mod provider;

pub use provider::ChainProvider;

use crate::error::VoterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Next nonce for `address`, counting transactions still in the pool
    async fn pending_nonce(&self, address: Address) -> VoterResult<u64>;

    /// Single legacy gas price suggested by the node
    async fn gas_price(&self) -> VoterResult<U256>;

    /// Base fee of the latest block
    async fn base_fee(&self) -> VoterResult<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> VoterResult<U256>;

    /// Submit a signed transaction; returns as soon as the node accepts it
    async fn send_raw_transaction(&self, raw: Bytes) -> VoterResult<H256>;

    /// `Ok(None)` means the node has no receipt for `tx_hash` yet
    async fn transaction_receipt(&self, tx_hash: H256) -> VoterResult<Option<TransactionReceipt>>;
}
