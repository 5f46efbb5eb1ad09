//! Swap Escrow - client-side lifecycle engine for multi-party escrow swaps
//!
//! Derives swap identities, reads on-ledger swap state, builds the ordered
//! operation groups of every lifecycle step and dispatches them one after
//! another until confirmed.

pub mod assets;
pub mod compat;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics;
pub mod observability;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod swap;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use context::SwapContext;
pub use errors::{SwapError, SwapResult};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use types::{ItemStatus, SwapItem, TradeStatus};
