//! Explicit per-call context shared by the resolver, builders and dispatcher

use crate::assets::{AssetProofSource, DasProofClient};
use crate::config::Config;
use crate::errors::SwapResult;
use crate::rpc_manager::{LedgerRpc, SolanaLedger};
use crate::tx_builder::BundleDispatcher;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::sync::Arc;

/// Ledger handle, program address, commitment and proof source
///
/// Cheap to clone; nothing in it is mutated by lifecycle calls.
#[derive(Debug, Clone)]
pub struct SwapContext {
    pub rpc: Arc<dyn LedgerRpc>,
    pub program_id: Pubkey,
    pub commitment: CommitmentConfig,
    pub proofs: Arc<dyn AssetProofSource>,
}

impl SwapContext {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        program_id: Pubkey,
        commitment: CommitmentConfig,
        proofs: Arc<dyn AssetProofSource>,
    ) -> Self {
        Self {
            rpc,
            program_id,
            commitment,
            proofs,
        }
    }

    /// Production context: RPC client and DAS proof client from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let commitment = config.commitment()?;
        let rpc: Arc<dyn LedgerRpc> = Arc::new(SolanaLedger::new(
            config.rpc.url.clone(),
            commitment,
            config.rpc_timeout(),
        ));
        let proofs = Arc::new(DasProofClient::new(
            config.das_url(),
            rpc.clone(),
            commitment,
            config.rpc_timeout(),
        )?);
        Ok(Self::new(rpc, config.program_id()?, commitment, proofs))
    }

    pub fn dispatcher(&self) -> BundleDispatcher {
        BundleDispatcher::new(self.rpc.clone(), self.commitment)
    }

    pub async fn account_exists(&self, address: &Pubkey) -> SwapResult<bool> {
        Ok(self
            .rpc
            .get_account(address, self.commitment)
            .await?
            .is_some())
    }
}
