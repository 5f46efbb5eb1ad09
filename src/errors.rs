//! Error taxonomy for the swap lifecycle engine
//!
//! Every component fails with one of the kinds below, never with a raw
//! lower-layer error:
//! - Resolver and builder errors abort a call before anything is submitted
//! - Dispatcher errors abort after zero or more groups already landed;
//!   callers re-derive state and resubmit only the remaining delta

use crate::rpc_manager::RpcManagerError;
use crate::types::TradeStatus;
use thiserror::Error;

/// Domain tag carried by wrapped builder failures
pub const SWAP_DOMAIN: &str = "swap";

/// Comprehensive error type for swap lifecycle operations
#[derive(Error, Debug)]
pub enum SwapError {
    /// Malformed caller arguments (empty item list, bad address, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The swap account does not exist (yet)
    ///
    /// Initialization may still be propagating; retrying later can succeed.
    #[error("Swap account {address} not found")]
    NotFound { address: String },

    /// The swap exists but its phase does not allow the requested action
    #[error("Swap {address} is in phase {current:?}, expected one of {allowed:?}")]
    InvalidPhase {
        address: String,
        current: TradeStatus,
        allowed: Vec<TradeStatus>,
    },

    #[error("{party} is not a part of swap {address}")]
    NotPartOfSwap { address: String, party: String },

    #[error("{party} has already escrowed its items in swap {address}")]
    AlreadyDeposited { address: String, party: String },

    #[error("{party} has no items to escrow in swap {address}")]
    NothingToDeposit { address: String, party: String },

    #[error("Nothing found to modify in swap {address}")]
    NothingToModify { address: String },

    /// The reference blockhash left its validity window before the
    /// transaction became visible
    #[error("Blockhash expired for {signature} (expiry height {expiry_height}, current {current_height})")]
    BlockhashExpired {
        signature: String,
        expiry_height: u64,
        current_height: u64,
    },

    /// The on-ledger program rejected the transaction
    #[error("Transaction {signature} failed on-ledger: {details}")]
    ExecutionError { signature: String, details: String },

    /// Ledger transport / RPC failure
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcManagerError),

    /// Account or response bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Initialization dispatch failed after the swap address was derived
    ///
    /// The caller keeps the address so it can resume the initialization.
    #[error("Initializing swap {address} failed: {source}")]
    Initialization {
        address: String,
        #[source]
        source: Box<SwapError>,
    },

    /// Unexpected lower-layer failure reshaped at a builder boundary
    #[error("[{domain}] {address}: {message}")]
    Wrapped {
        domain: &'static str,
        address: String,
        message: String,
    },
}

impl SwapError {
    /// Check if re-invoking the whole call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::BlockhashExpired { .. } => true,
            Self::Timeout { .. } => true,
            Self::Rpc(e) => e.is_retryable(),
            Self::Initialization { source, .. } => source.is_retryable(),

            Self::InvalidInput(_)
            | Self::InvalidPhase { .. }
            | Self::NotPartOfSwap { .. }
            | Self::AlreadyDeposited { .. }
            | Self::NothingToDeposit { .. }
            | Self::NothingToModify { .. }
            | Self::ExecutionError { .. }
            | Self::Decode(_)
            | Self::Signing(_)
            | Self::Config(_)
            | Self::Wrapped { .. } => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::InvalidPhase { .. } => "invalid_phase",
            Self::NotPartOfSwap { .. } => "not_part_of_swap",
            Self::AlreadyDeposited { .. } => "already_deposited",
            Self::NothingToDeposit { .. } => "nothing_to_deposit",
            Self::NothingToModify { .. } => "nothing_to_modify",
            Self::BlockhashExpired { .. } => "blockhash_expired",
            Self::ExecutionError { .. } => "execution",
            Self::Rpc(_) => "rpc",
            Self::Decode(_) => "decode",
            Self::Signing(_) => "signing",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
            Self::Initialization { source, .. } => source.category(),
            Self::Wrapped { .. } => "wrapped",
        }
    }

    /// Component family the error originates from
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Wrapped { domain, .. } => domain,
            Self::Initialization { source, .. } => source.domain(),
            Self::BlockhashExpired { .. }
            | Self::ExecutionError { .. }
            | Self::Signing(_)
            | Self::Timeout { .. } => "dispatch",
            Self::Rpc(_) => "rpc",
            Self::Config(_) => "config",
            _ => SWAP_DOMAIN,
        }
    }

    /// Builder-level precondition failures surface verbatim to the caller
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound { .. }
                | Self::InvalidPhase { .. }
                | Self::NotPartOfSwap { .. }
                | Self::AlreadyDeposited { .. }
                | Self::NothingToDeposit { .. }
                | Self::NothingToModify { .. }
        )
    }

    /// Reshape an unexpected failure at a builder boundary
    ///
    /// Precondition errors and already-wrapped errors pass through unchanged.
    pub fn wrap(self, address: impl ToString) -> Self {
        if self.is_precondition() || matches!(self, Self::Wrapped { .. } | Self::Initialization { .. }) {
            return self;
        }
        Self::Wrapped {
            domain: SWAP_DOMAIN,
            address: address.to_string(),
            message: self.to_string(),
        }
    }
}

// Convenience constructors for common error scenarios
impl SwapError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn not_found(address: impl ToString) -> Self {
        Self::NotFound {
            address: address.to_string(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }
}

impl From<borsh::io::Error> for SwapError {
    fn from(err: borsh::io::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<solana_sdk::signer::SignerError> for SwapError {
    fn from(err: solana_sdk::signer::SignerError) -> Self {
        Self::Signing(err.to_string())
    }
}

/// Result type for swap operations
pub type SwapResult<T> = Result<T, SwapError>;
