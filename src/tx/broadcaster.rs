//! Raw transaction submission

use super::builder::SignedTransaction;
use crate::chain::ChainRpc;
use crate::error::{VoterError, VoterResult};

use ethers::types::H256;
use tracing::{error, info, warn};

/// Hands signed transactions to a node without waiting for inclusion
pub struct Broadcaster<'a, R: ChainRpc + ?Sized> {
    rpc: &'a R,
    chain_id: u64,
}

impl<'a, R: ChainRpc + ?Sized> Broadcaster<'a, R> {
    pub fn new(rpc: &'a R, chain_id: u64) -> Self {
        Self { rpc, chain_id }
    }

    /// Submit `tx` and return its hash once the node admits it to the pool.
    ///
    /// Rejections are returned as-is; nothing is re-priced or resent here.
    pub async fn broadcast(&self, tx: SignedTransaction) -> VoterResult<H256> {
        let local_hash = tx.hash();
        let nonce = tx.nonce();

        let node_hash = match self.rpc.send_raw_transaction(tx.into_raw()).await {
            Ok(hash) => hash,
            Err(e) => {
                if let VoterError::Broadcast { reason, .. } = &e {
                    error!(
                        "Transaction {:?} (nonce {}) rejected on chain {}: {}",
                        local_hash, nonce, self.chain_id, reason
                    );
                }
                return Err(e);
            }
        };

        if node_hash != local_hash {
            warn!(
                "Node reported hash {:?} for locally computed {:?}",
                node_hash, local_hash
            );
        }

        info!("Transaction sent: {:?} (nonce {})", node_hash, nonce);
        crate::metrics::record_tx_submitted(self.chain_id);

        Ok(node_hash)
    }
}
