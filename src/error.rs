//! Error types for the feed voter

use std::fmt;
use thiserror::Error;

/// Why a node refused to admit a transaction to its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NonceTooLow,
    Underpriced,
    InsufficientFunds,
    Other,
}

impl RejectReason {
    /// Classify a node's rejection message
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("nonce too low") {
            RejectReason::NonceTooLow
        } else if message.contains("underpriced") {
            RejectReason::Underpriced
        } else if message.contains("insufficient funds") {
            RejectReason::InsufficientFunds
        } else {
            RejectReason::Other
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectReason::NonceTooLow => "nonce too low",
            RejectReason::Underpriced => "underpriced",
            RejectReason::InsufficientFunds => "insufficient funds",
            RejectReason::Other => "rejected",
        };
        f.write_str(label)
    }
}

/// Main error type for the voter
#[derive(Error, Debug)]
pub enum VoterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error for field {field}: {message}")]
    Encoding { field: String, message: String },

    #[error("Nonce query failed on {endpoint}: {message}")]
    Nonce { endpoint: String, message: String },

    #[error("Fee query failed on {endpoint}: {message}")]
    FeeQuery { endpoint: String, message: String },

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Broadcast rejected by {endpoint} ({reason}): {message}")]
    Broadcast {
        endpoint: String,
        reason: RejectReason,
        message: String,
    },

    #[error("No receipt for {tx_hash} within {waited_secs}s, outcome unknown")]
    PollTimeout { tx_hash: String, waited_secs: u64 },

    #[error("Receipt query for {tx_hash} failed on {endpoint}: {message}")]
    PollTransport {
        tx_hash: String,
        endpoint: String,
        message: String,
    },

    #[error("Transaction {tx_hash} reverted in block {block_number:?}")]
    Reverted {
        tx_hash: String,
        block_number: Option<u64>,
    },

    #[error("Transaction {tx_hash} confirmed but the order service was not told: {message}")]
    ConfirmReport { tx_hash: String, message: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl VoterError {
    /// Check if a fresh attempt may be started after this error.
    ///
    /// Only failures that happen before anything was broadcast qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VoterError::Nonce { .. }
                | VoterError::FeeQuery { .. }
                | VoterError::Http(_)
                | VoterError::Api(_)
        )
    }

    /// A transaction was broadcast but its fate could not be observed
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            VoterError::PollTimeout { .. } | VoterError::PollTransport { .. }
        )
    }

    /// Short stage label used for metrics
    pub fn stage(&self) -> &'static str {
        match self {
            VoterError::Config(_) => "config",
            VoterError::InvalidInput(_) | VoterError::Encoding { .. } => "encode",
            VoterError::Nonce { .. } => "nonce",
            VoterError::FeeQuery { .. } | VoterError::GasEstimation(_) => "fees",
            VoterError::Signing(_) | VoterError::Wallet(_) => "sign",
            VoterError::Broadcast { .. } => "broadcast",
            VoterError::PollTimeout { .. } | VoterError::PollTransport { .. } => "poll",
            VoterError::Reverted { .. } => "reverted",
            VoterError::ConfirmReport { .. } => "report",
            VoterError::Api(_) | VoterError::Http(_) => "api",
        }
    }
}

/// Result type for voter operations
pub type VoterResult<T> = Result<T, VoterError>;
