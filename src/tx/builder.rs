//! Transaction assembly and signing

use super::fees::{FeeStrategy, FeeTerms};
use crate::abi::EncodedCall;
use crate::chain::ChainRpc;
use crate::error::{VoterError, VoterResult};

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::{debug, info};

/// Build the request shared by gas estimation and signing
#[allow(clippy::too_many_arguments)]
fn call_request(
    chain_id: u64,
    from: Address,
    to: Address,
    nonce: u64,
    value: U256,
    gas: Option<U256>,
    fees: &FeeTerms,
    data: &EncodedCall,
) -> TypedTransaction {
    match fees {
        FeeTerms::Legacy { gas_price } => {
            let mut tx = TransactionRequest::new()
                .from(from)
                .to(to)
                .value(value)
                .data(data.clone().into_bytes())
                .nonce(nonce)
                .gas_price(*gas_price)
                .chain_id(chain_id);
            if let Some(gas) = gas {
                tx = tx.gas(gas);
            }
            TypedTransaction::Legacy(tx)
        }
        FeeTerms::Capped {
            max_priority_fee_per_gas,
            max_fee_per_gas,
        } => {
            let mut tx = Eip1559TransactionRequest::new()
                .from(from)
                .to(to)
                .value(value)
                .data(data.clone().into_bytes())
                .nonce(nonce)
                .max_fee_per_gas(*max_fee_per_gas)
                .max_priority_fee_per_gas(*max_priority_fee_per_gas)
                .chain_id(chain_id);
            if let Some(gas) = gas {
                tx = tx.gas(gas);
            }
            TypedTransaction::Eip1559(tx)
        }
    }
}

/// A fully priced contract call that has not been signed yet
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub from: Address,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub fees: FeeTerms,
    pub data: EncodedCall,
}

impl UnsignedTransaction {
    /// Typed request matching the fee variant: legacy or EIP-1559
    pub fn to_typed(&self) -> TypedTransaction {
        call_request(
            self.chain_id,
            self.from,
            self.to,
            self.nonce,
            self.value,
            Some(self.gas_limit),
            &self.fees,
            &self.data,
        )
    }
}

/// Signed, chain-bound transaction ready for submission
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signature: Signature,
    raw: Bytes,
    hash: H256,
}

impl SignedTransaction {
    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.unsigned.nonce
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Signed RLP envelope as sent to the node
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn into_raw(self) -> Bytes {
        self.raw
    }
}

/// Queries nonce and fees, then sizes the gas limit for a call
pub struct TransactionAssembler<'a, R: ChainRpc + ?Sized> {
    rpc: &'a R,
    fees: &'a FeeStrategy,
    chain_id: u64,
}

impl<'a, R: ChainRpc + ?Sized> TransactionAssembler<'a, R> {
    pub fn new(rpc: &'a R, fees: &'a FeeStrategy, chain_id: u64) -> Self {
        Self { rpc, fees, chain_id }
    }

    /// Assemble a zero-value call from `from` to `to`
    pub async fn assemble(
        &self,
        from: Address,
        to: Address,
        data: EncodedCall,
    ) -> VoterResult<UnsignedTransaction> {
        let nonce = self.rpc.pending_nonce(from).await?;
        let fees = self.fees.fee_terms(self.rpc).await?;

        let draft = call_request(
            self.chain_id,
            from,
            to,
            nonce,
            U256::zero(),
            None,
            &fees,
            &data,
        );
        let gas_limit = self.fees.gas_limit(self.rpc, &draft).await;

        debug!(
            "Assembled tx for chain {}: nonce {}, gas limit {}, max cost {} wei, {} bytes of call data",
            self.chain_id,
            nonce,
            gas_limit,
            fees.max_cost(gas_limit),
            data.len()
        );

        Ok(UnsignedTransaction {
            chain_id: self.chain_id,
            from,
            nonce,
            to,
            value: U256::zero(),
            gas_limit,
            fees,
            data,
        })
    }
}

/// Signs transactions with a local private key
#[derive(Debug, Clone)]
pub struct TransactionSigner {
    wallet: LocalWallet,
}

impl TransactionSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign `tx` for its declared chain.
    ///
    /// Legacy terms get EIP-155 replay protection, capped terms produce a
    /// type-2 envelope.
    pub fn sign(&self, tx: UnsignedTransaction) -> VoterResult<SignedTransaction> {
        if tx.from != self.wallet.address() {
            return Err(VoterError::Signing(format!(
                "Transaction sender {:?} does not match signer {:?}",
                tx.from,
                self.wallet.address()
            )));
        }

        let typed = tx.to_typed();
        let wallet = self.wallet.clone().with_chain_id(tx.chain_id);
        let signature = wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| VoterError::Signing(e.to_string()))?;

        let raw = typed.rlp_signed(&signature);
        let hash = typed.hash(&signature);

        info!(
            "Signed transaction {:?} (nonce {}, chain {})",
            hash, tx.nonce, tx.chain_id
        );

        Ok(SignedTransaction {
            unsigned: tx,
            signature,
            raw,
            hash,
        })
    }
}
