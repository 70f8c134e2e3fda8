//! Order service collaborator
//!
//! Signs the wallet in, issues vote orders carrying the payment parameters
//! for the `feed` call, and takes the transaction hash back once the vote
//! has been mined. Orders can be looked up again when a vote's fate is
//! unknown.

pub mod client;
pub mod models;

pub use client::OrderClient;
pub use models::{CreateOrderRequest, OrderData, VoteOrder};

use crate::error::VoterResult;
use crate::wallet::Wallet;

use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Sign in with `wallet` and return a bearer token
    async fn sign_in(&self, wallet: &Wallet) -> VoterResult<String>;

    async fn create_order(&self, token: &str, request: &CreateOrderRequest)
        -> VoterResult<OrderData>;

    /// Current state of an order, as seen by the service
    async fn get_order(&self, token: &str, order_id: &str) -> VoterResult<VoteOrder>;

    async fn confirm_order(&self, token: &str, order_id: &str, tx_hash: &str) -> VoterResult<()>;
}
