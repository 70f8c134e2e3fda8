//! Wire types of the order service

use crate::abi::CallParameters;
use crate::error::{VoterError, VoterResult};

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Every response wraps its payload in `data`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(rename = "statusCode", default)]
    pub status_code: u16,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub address: &'a str,
    pub message: &'a str,
    pub signature: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInToken {
    #[serde(default, alias = "accessToken")]
    pub token: String,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "candidateID")]
    pub candidate_id: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    #[serde(rename = "countryId")]
    pub country_id: String,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: String,
    #[serde(rename = "walletID")]
    pub wallet_id: String,
    #[serde(rename = "feedAmount")]
    pub feed_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOrderRequest<'a> {
    #[serde(rename = "txHash")]
    pub tx_hash: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteOrder {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub feed_amount: i64,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub request_data: String,
    #[serde(default)]
    pub user_hashed_message: String,
    #[serde(default)]
    pub integrity_signature: String,
}

impl PaymentParams {
    /// Normalize into `feed` call arguments
    pub fn call_parameters(&self, candidate_id: &str) -> VoterResult<CallParameters> {
        CallParameters::new(
            candidate_id,
            self.feed_amount,
            self.request_id.as_str(),
            self.request_data.as_str(),
            &self.user_hashed_message,
            &self.integrity_signature,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub contract_address: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub params: PaymentParams,
}

impl Payment {
    pub fn contract(&self) -> VoterResult<Address> {
        self.contract_address.trim().parse().map_err(|e| {
            VoterError::InvalidInput(format!(
                "Invalid contract address {:?}: {}",
                self.contract_address, e
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
    pub order: VoteOrder,
    pub payment: Payment,
}

/// Order lookup response; only the order part is read
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatus {
    pub order: VoteOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}
