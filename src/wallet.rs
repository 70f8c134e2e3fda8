//! Local key wallet used for sign-in and vote transactions

use crate::error::{VoterError, VoterResult};
use crate::tx::TransactionSigner;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use ethers::utils::to_checksum;

#[derive(Debug, Clone)]
pub struct Wallet {
    inner: LocalWallet,
}

impl Wallet {
    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> VoterResult<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(VoterError::Signing("No private key configured".to_string()));
        }

        let digits = key
            .strip_prefix("0x")
            .or_else(|| key.strip_prefix("0X"))
            .unwrap_or(key);

        let inner = digits
            .parse::<LocalWallet>()
            .map_err(|e| VoterError::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// EIP-55 checksummed address
    pub fn checksum_address(&self) -> String {
        to_checksum(&self.inner.address(), None)
    }

    /// Sign `message` as an EIP-191 personal message.
    ///
    /// Returns 0x-prefixed r || s || v with v in {27, 28}.
    pub async fn sign_message(&self, message: &str) -> VoterResult<String> {
        let signature = self
            .inner
            .sign_message(message)
            .await
            .map_err(|e| VoterError::Wallet(format!("Failed to sign message: {}", e)))?;

        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    pub fn transaction_signer(&self) -> TransactionSigner {
        TransactionSigner::new(self.inner.clone())
    }
}
