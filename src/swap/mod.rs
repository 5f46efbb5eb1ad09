//! Swap lifecycle: resolver, operation builders and processors
//!
//! Builders read fresh state, check phase and party preconditions and
//! return ordered operation groups; they never submit anything. The
//! processors in [`lifecycle`] pair a builder with the dispatcher.

pub mod ata;
pub mod cancel;
pub mod claim;
pub mod deposit;
pub mod details;
pub mod identity;
pub mod initialize;
pub mod lifecycle;
pub mod modify;
pub mod program;
pub mod transfer;
pub mod validate;

pub use cancel::build_cancel;
pub use claim::build_claim;
pub use deposit::build_deposit;
pub use details::{user_swap_details, UserSwapDetails};
pub use identity::{assert_phase, derive_identity, fetch_state, require_state, SwapIdentity};
pub use initialize::{build_initialize, InitializePlan, SwapInfo};
pub use modify::build_modify;
pub use validate::{build_validate_canceled, build_validate_claimed};

use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::types::{SwapState, TradeStatus};
use solana_sdk::pubkey::Pubkey;

/// Fetch state, gate on phase and re-derive the identity from the stored seed
pub(crate) async fn load_in_phase(
    ctx: &SwapContext,
    address: &Pubkey,
    allowed: &[TradeStatus],
) -> SwapResult<(SwapState, SwapIdentity)> {
    let state = require_state(ctx, address).await?;
    assert_phase(&state, allowed)?;
    let identity = SwapIdentity::from_state(&state, &ctx.program_id)?;
    Ok((state, identity))
}
