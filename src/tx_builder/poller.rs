//! Confirmation polling with resubmission inside the blockhash window

use crate::errors::{SwapError, SwapResult};
use crate::metrics::metrics;
use crate::rpc_manager::LedgerRpc;
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a successful poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: Signature,
    /// Times the signed transaction was sent again while not visible
    pub resubmissions: u32,
}

/// Polls one signature until it lands, fails or its blockhash expires
///
/// While the signature is not visible and the ledger has not passed
/// `expiry_height`, the same signed transaction is resubmitted every
/// `retry_delay`. Resubmitting is idempotent: the signature is fixed.
pub struct ConfirmationPoller {
    rpc: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
    retry_delay: Duration,
}

impl ConfirmationPoller {
    pub fn new(rpc: Arc<dyn LedgerRpc>, commitment: CommitmentConfig, retry_delay: Duration) -> Self {
        Self {
            rpc,
            commitment,
            retry_delay,
        }
    }

    pub async fn poll(
        &self,
        signature: Signature,
        transaction: &VersionedTransaction,
        expiry_height: u64,
    ) -> SwapResult<Confirmation> {
        let mut resubmissions = 0u32;

        loop {
            match self
                .rpc
                .get_signature_status(&signature, self.commitment)
                .await?
            {
                Some(Ok(())) => {
                    debug!(signature = %signature, resubmissions, "Signature confirmed");
                    return Ok(Confirmation {
                        signature,
                        resubmissions,
                    });
                }
                Some(Err(err)) => {
                    metrics().execution_errors.inc();
                    warn!(signature = %signature, error = %err, "Transaction failed on-ledger");
                    return Err(SwapError::ExecutionError {
                        signature: signature.to_string(),
                        details: err.to_string(),
                    });
                }
                None => {
                    let current_height = self.rpc.get_block_height(self.commitment).await?;
                    if current_height > expiry_height {
                        metrics().blockhash_expired.inc();
                        warn!(
                            signature = %signature,
                            expiry_height,
                            current_height,
                            "Blockhash expired before the transaction became visible"
                        );
                        return Err(SwapError::BlockhashExpired {
                            signature: signature.to_string(),
                            expiry_height,
                            current_height,
                        });
                    }

                    resubmissions += 1;
                    metrics().resubmissions.inc();
                    debug!(
                        signature = %signature,
                        attempt = resubmissions,
                        current_height,
                        expiry_height,
                        "Signature not visible yet, resubmitting"
                    );
                    if let Err(e) = self.rpc.send_transaction(transaction, true).await {
                        // the next status query decides
                        warn!(signature = %signature, error = %e, "Resubmission failed");
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
