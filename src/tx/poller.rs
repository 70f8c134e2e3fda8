//! Receipt polling with a hard deadline
//!
//! ```text
//! Pending ──receipt──────────▶ Confirmed
//!    │ ──not found, sleep────▶ Pending
//!    │ ──deadline passed─────▶ TimedOut
//!    └ ──query error─────────▶ Failed
//! ```

use crate::chain::ChainRpc;
use crate::config::ChainConfig;
use crate::error::{VoterError, VoterResult};

use ethers::types::{TransactionReceipt, H256, U256};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Receipt of an included transaction. A failed status is data, not an error.
#[derive(Debug, Clone)]
pub struct ConfirmedReceipt {
    pub tx_hash: H256,
    pub status: Option<u64>,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl ConfirmedReceipt {
    fn from_receipt(tx_hash: H256, receipt: TransactionReceipt) -> Self {
        Self {
            tx_hash,
            status: receipt.status.map(|s| s.as_u64()),
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
        }
    }

    /// Executed without reverting
    pub fn succeeded(&self) -> bool {
        self.status == Some(1)
    }
}

/// State of one receipt watch
#[derive(Debug)]
pub enum PollState {
    Pending {
        tx_hash: H256,
        deadline: Instant,
        /// Queries answered with "not found" so far
        misses: u32,
    },
    Confirmed(ConfirmedReceipt),
    TimedOut {
        tx_hash: H256,
    },
    Failed {
        tx_hash: H256,
        error: VoterError,
    },
}

impl PollState {
    pub fn pending(tx_hash: H256, deadline: Instant) -> Self {
        PollState::Pending {
            tx_hash,
            deadline,
            misses: 0,
        }
    }
}

/// Waits for a broadcast transaction to be included
#[derive(Debug, Clone)]
pub struct ConfirmationPoller {
    chain_id: u64,
    interval: Duration,
    timeout: Duration,
}

impl ConfirmationPoller {
    pub fn new(chain_id: u64, interval: Duration, timeout: Duration) -> Self {
        Self {
            chain_id,
            interval,
            timeout,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            config.chain_id,
            Duration::from_millis(config.receipt_poll_interval_ms),
            Duration::from_secs(config.receipt_timeout_secs),
        )
    }

    /// Poll until `tx_hash` has a receipt, the timeout elapses or a query fails
    pub async fn wait<R: ChainRpc + ?Sized>(
        &self,
        rpc: &R,
        tx_hash: H256,
    ) -> VoterResult<ConfirmedReceipt> {
        let started = Instant::now();
        let mut state = PollState::pending(tx_hash, started + self.timeout);

        loop {
            state = match self.step(rpc, state).await {
                PollState::Confirmed(receipt) => {
                    let waited = started.elapsed();
                    info!(
                        "Receipt for {:?} in block {:?} after {:.1}s (status {:?}, gas used {:?})",
                        tx_hash,
                        receipt.block_number,
                        waited.as_secs_f64(),
                        receipt.status,
                        receipt.gas_used
                    );
                    crate::metrics::record_receipt_latency(self.chain_id, waited.as_secs_f64());
                    return Ok(receipt);
                }
                PollState::TimedOut { tx_hash } => {
                    warn!(
                        "No receipt for {:?} after {}s, outcome unknown",
                        tx_hash,
                        self.timeout.as_secs()
                    );
                    return Err(VoterError::PollTimeout {
                        tx_hash: format!("{:?}", tx_hash),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
                PollState::Failed { error, .. } => return Err(error),
                pending => pending,
            };
        }
    }

    /// Advance a pending watch by one query. Terminal states are returned as-is.
    pub async fn step<R: ChainRpc + ?Sized>(&self, rpc: &R, state: PollState) -> PollState {
        let (tx_hash, deadline, misses) = match state {
            PollState::Pending {
                tx_hash,
                deadline,
                misses,
            } => (tx_hash, deadline, misses),
            terminal => return terminal,
        };

        if Instant::now() >= deadline {
            return PollState::TimedOut { tx_hash };
        }

        // an in-flight query is abandoned at the deadline
        let query = match timeout_at(deadline, rpc.transaction_receipt(tx_hash)).await {
            Ok(query) => query,
            Err(_) => return PollState::TimedOut { tx_hash },
        };

        match query {
            Ok(Some(receipt)) => {
                PollState::Confirmed(ConfirmedReceipt::from_receipt(tx_hash, receipt))
            }
            Ok(None) => {
                debug!(
                    "No receipt yet for {:?} (miss {}), next check in {:?}",
                    tx_hash,
                    misses + 1,
                    self.interval
                );
                sleep_until((Instant::now() + self.interval).min(deadline)).await;

                if Instant::now() >= deadline {
                    PollState::TimedOut { tx_hash }
                } else {
                    PollState::Pending {
                        tx_hash,
                        deadline,
                        misses: misses + 1,
                    }
                }
            }
            Err(error) => PollState::Failed { tx_hash, error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainRpc;
    use async_trait::async_trait;
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{Address, Bytes};

    fn hash() -> H256 {
        H256::repeat_byte(0xab)
    }

    fn receipt(status: u64, block: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: hash(),
            status: Some(status.into()),
            block_number: Some(block.into()),
            ..Default::default()
        }
    }

    fn poller(timeout_secs: u64) -> ConfirmationPoller {
        ConfirmationPoller::new(1, Duration::from_secs(2), Duration::from_secs(timeout_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_three_misses() {
        let mut rpc = MockChainRpc::new();
        let mut calls = 0;
        rpc.expect_transaction_receipt()
            .times(4)
            .returning(move |_| {
                calls += 1;
                if calls <= 3 {
                    Ok(None)
                } else {
                    Ok(Some(receipt(1, 42)))
                }
            });

        let started = Instant::now();
        let confirmed = poller(300).wait(&rpc, hash()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(6));
        assert!(confirmed.succeeded());
        assert_eq!(confirmed.block_number, Some(42));
        assert_eq!(confirmed.tx_hash, hash());
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline_not_before() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_receipt().returning(|_| Ok(None));

        let started = Instant::now();
        let err = poller(5).wait(&rpc, hash()).await.unwrap_err();
        let waited = started.elapsed();

        assert!(matches!(err, VoterError::PollTimeout { .. }));
        assert!(err.is_outcome_unknown());
        assert!(waited >= Duration::from_secs(5));
        // the last sleep is cut short at the deadline instead of a full interval
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_fails_immediately() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_receipt().times(1).returning(|_| {
            Err(VoterError::PollTransport {
                tx_hash: format!("{:?}", hash()),
                endpoint: "http://node".to_string(),
                message: "502 Bad Gateway".to_string(),
            })
        });

        let started = Instant::now();
        let err = poller(300).wait(&rpc, hash()).await.unwrap_err();

        assert!(matches!(err, VoterError::PollTransport { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_receipt_is_still_confirmed() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(receipt(0, 7))));

        let confirmed = poller(300).wait(&rpc, hash()).await.unwrap();
        assert!(!confirmed.succeeded());
        assert_eq!(confirmed.status, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_leaves_terminal_states_alone() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_transaction_receipt().never();

        let state = poller(5)
            .step(&rpc, PollState::TimedOut { tx_hash: hash() })
            .await;
        assert!(matches!(state, PollState::TimedOut { .. }));

        let expired = PollState::pending(hash(), Instant::now());
        let state = poller(5).step(&rpc, expired).await;
        assert!(matches!(state, PollState::TimedOut { .. }));
    }

    /// Node whose receipt queries never answer
    struct StalledNode;

    #[async_trait]
    impl ChainRpc for StalledNode {
        async fn pending_nonce(&self, _address: Address) -> VoterResult<u64> {
            unimplemented!()
        }

        async fn gas_price(&self) -> VoterResult<U256> {
            unimplemented!()
        }

        async fn base_fee(&self) -> VoterResult<U256> {
            unimplemented!()
        }

        async fn estimate_gas(&self, _tx: &TypedTransaction) -> VoterResult<U256> {
            unimplemented!()
        }

        async fn send_raw_transaction(&self, _raw: Bytes) -> VoterResult<H256> {
            unimplemented!()
        }

        async fn transaction_receipt(
            &self,
            _tx_hash: H256,
        ) -> VoterResult<Option<TransactionReceipt>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_query_is_cut_off_at_deadline() {
        let started = Instant::now();
        let err = poller(5).wait(&StalledNode, hash()).await.unwrap_err();

        assert!(matches!(err, VoterError::PollTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
