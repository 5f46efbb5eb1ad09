//! Production [`LedgerRpc`] over the nonblocking Solana RPC client

use super::{LedgerRpc, RpcManagerError, RpcResult, SignatureStatus};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct SolanaLedger {
    client: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for SolanaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedger")
            .field("url", &self.url)
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

impl SolanaLedger {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let url = url.into();
        let client = RpcClient::new_with_timeout_and_commitment(url.clone(), timeout, commitment);
        Self {
            client: Arc::new(client),
            url,
            commitment,
        }
    }

    /// Underlying client, for callers needing RPC methods outside [`LedgerRpc`]
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(err, &self.url)
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> RpcResult<Option<Account>> {
        let response = self
            .client
            .get_account_with_commitment(address, commitment)
            .await
            .map_err(|e| self.map_err(e))?;
        debug!(address = %address, exists = response.value.is_some(), "Fetched account");
        Ok(response.value)
    }

    async fn get_latest_blockhash(&self, commitment: CommitmentConfig) -> RpcResult<(Hash, u64)> {
        self.client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn get_block_height(&self, commitment: CommitmentConfig) -> RpcResult<u64> {
        self.client
            .get_block_height_with_commitment(commitment)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> RpcResult<SignatureStatus> {
        self.client
            .get_signature_status_with_commitment(signature, commitment)
            .await
            .map_err(|e| self.map_err(e))
    }

    #[instrument(skip(self, transaction), fields(endpoint = %self.url))]
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> RpcResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            // resubmission is driven by the confirmation poller
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| self.map_err(e))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
