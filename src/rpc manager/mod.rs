//! RPC Manager Module
//!
//! Ledger access seam used by the resolver, builders and dispatcher

use async_trait::async_trait;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};

// Submodules
pub mod rpc_client;
pub mod rpc_errors;

// Re-exports for convenience
pub use rpc_client::SolanaLedger;
pub use rpc_errors::RpcManagerError;

pub type RpcResult<T> = Result<T, RpcManagerError>;

/// Status of a submitted signature as seen by the ledger
///
/// `None` means not (yet) visible at the requested commitment.
pub type SignatureStatus = Option<Result<(), TransactionError>>;

/// Remote ledger operations required by the swap engine
#[async_trait]
pub trait LedgerRpc: Send + Sync + std::fmt::Debug {
    /// Raw account, `None` when it does not exist
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> RpcResult<Option<Account>>;

    /// Latest blockhash and the last block height at which it stays valid
    async fn get_latest_blockhash(&self, commitment: CommitmentConfig) -> RpcResult<(Hash, u64)>;

    async fn get_block_height(&self, commitment: CommitmentConfig) -> RpcResult<u64>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> RpcResult<SignatureStatus>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> RpcResult<Signature>;

    /// Endpoint label used in logs and errors
    fn endpoint(&self) -> &str {
        "ledger"
    }
}
