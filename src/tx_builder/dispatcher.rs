//! Bundled-operation dispatcher
//!
//! Turns an ordered list of operation groups into confirmed transactions.
//! Groups are dispatched strictly one after another: each is signed against
//! a fresh blockhash, submitted, and confirmed before the next one starts.
//! A failure aborts the call; groups that already landed stay landed.

use crate::compat;
use crate::errors::{SwapError, SwapResult};
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{LedgerRpc, RpcManagerError};
use crate::tx_builder::group::{GroupKind, GroupPayload, OperationGroup};
use crate::tx_builder::instructions::with_priority_fee;
use crate::tx_builder::poller::ConfirmationPoller;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::{Message, VersionedMessage},
    signature::Signature,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call dispatch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Micro-lamports per compute unit, injected into legacy groups
    pub priority_fee: Option<u64>,
    pub retry_delay: Duration,
    /// Submit with `skip_preflight`
    pub skip_simulation: bool,
    /// Return right after submission without polling
    pub skip_confirmation: bool,
    /// Upper bound for the whole call
    pub deadline: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            priority_fee: None,
            retry_delay: Duration::from_secs(5),
            skip_simulation: false,
            skip_confirmation: false,
            deadline: None,
        }
    }
}

/// Lifecycle of one group inside a dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Signing,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BundleDispatcher {
    rpc: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
}

impl BundleDispatcher {
    pub fn new(rpc: Arc<dyn LedgerRpc>, commitment: CommitmentConfig) -> Self {
        Self { rpc, commitment }
    }

    /// Dispatch groups in order, returning their signatures in the same order
    pub async fn dispatch(
        &self,
        groups: Vec<OperationGroup>,
        signer: &dyn Signer,
        options: &DispatchOptions,
    ) -> SwapResult<Vec<Signature>> {
        match options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.dispatch_all(groups, signer, options))
                .await
                .map_err(|_| SwapError::Timeout {
                    operation: format!("dispatch (deadline {}s)", deadline.as_secs()),
                })?,
            None => self.dispatch_all(groups, signer, options).await,
        }
    }

    async fn dispatch_all(
        &self,
        groups: Vec<OperationGroup>,
        signer: &dyn Signer,
        options: &DispatchOptions,
    ) -> SwapResult<Vec<Signature>> {
        let total = groups.len();
        let mut signatures = Vec::with_capacity(total);
        let poller = ConfirmationPoller::new(self.rpc.clone(), self.commitment, options.retry_delay);

        for (index, group) in groups.into_iter().enumerate() {
            let kind = group.kind;
            match self.dispatch_one(group, signer, options, &poller).await {
                Ok(signature) => {
                    info!(group = %kind, index, total, signature = %signature, "Group landed");
                    signatures.push(signature);
                }
                Err(e) => {
                    metrics().groups_failed.inc();
                    warn!(
                        group = %kind,
                        index,
                        total,
                        confirmed = signatures.len(),
                        error = %e,
                        "Group failed, aborting dispatch"
                    );
                    return Err(e);
                }
            }
        }
        Ok(signatures)
    }

    async fn dispatch_one(
        &self,
        group: OperationGroup,
        signer: &dyn Signer,
        options: &DispatchOptions,
        poller: &ConfirmationPoller,
    ) -> SwapResult<Signature> {
        let kind = group.kind;
        let payer = signer.pubkey();
        trace_state(kind, GroupState::Pending);

        let (blockhash, expiry_height) = self.rpc.get_latest_blockhash(self.commitment).await?;

        trace_state(kind, GroupState::Signing);
        let message = match group.payload {
            GroupPayload::Legacy(instructions) => {
                let instructions = with_priority_fee(instructions, options.priority_fee);
                VersionedMessage::Legacy(Message::new_with_blockhash(
                    &instructions,
                    Some(&payer),
                    &blockhash,
                ))
            }
            GroupPayload::Precompiled(mut message) => {
                if compat::get_fee_payer(&message) != Some(&payer) {
                    return Err(SwapError::invalid_input(format!(
                        "precompiled {kind} group must name {payer} as fee payer"
                    )));
                }
                if options.priority_fee.is_some() {
                    debug!(group = %kind, "Precompiled group, priority fee not injected");
                }
                message.set_recent_blockhash(blockhash);
                message
            }
        };
        let signers = [signer];
        let transaction = VersionedTransaction::try_new(message, &signers[..])?;
        let signature = transaction.signatures[0];

        let submitted = self
            .rpc
            .send_transaction(&transaction, options.skip_simulation)
            .await?;
        if submitted != signature {
            return Err(RpcManagerError::MalformedResponse {
                endpoint: self.rpc.endpoint().to_string(),
                message: format!("sent {signature}, ledger answered {submitted}"),
            }
            .into());
        }
        metrics().groups_submitted.inc();
        trace_state(kind, GroupState::Submitted);

        if options.skip_confirmation {
            return Ok(signature);
        }

        trace_state(kind, GroupState::Confirming);
        let timer = Timer::new();
        let confirmation = poller.poll(signature, &transaction, expiry_height).await?;
        timer.observe_duration(&metrics().confirmation_latency);
        metrics().groups_confirmed.inc();
        trace_state(kind, GroupState::Confirmed);
        debug!(
            group = %kind,
            signature = %signature,
            resubmissions = confirmation.resubmissions,
            "Group confirmed"
        );
        Ok(signature)
    }
}

fn trace_state(kind: GroupKind, state: GroupState) {
    debug!(group = %kind, state = ?state, "Group state");
}
