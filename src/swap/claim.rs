//! Claim: distribute escrowed items to their destinaries and close

use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::swap::ata::AtaPlanner;
use crate::swap::load_in_phase;
use crate::swap::program::{self, names};
use crate::swap::transfer::{transfer_unit, Direction};
use crate::tx_builder::{pack_instructions, GroupKind, OperationGroup};
use crate::types::TradeStatus;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// `[ValidateDeposit, Claim.., ValidateClaimed]`
///
/// Anyone may pay for the claim; items always go to their destinaries.
/// When every item is already claimed only the finalizing group remains.
pub async fn build_claim(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &Pubkey,
    skip_finalize: bool,
) -> SwapResult<Vec<OperationGroup>> {
    build(ctx, address, signer, skip_finalize)
        .await
        .map_err(|e| e.wrap(address))
}

async fn build(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &Pubkey,
    skip_finalize: bool,
) -> SwapResult<Vec<OperationGroup>> {
    let (state, identity) = load_in_phase(ctx, address, &[TradeStatus::WaitingToClaim]).await?;

    let mut planner = AtaPlanner::new(ctx, *signer);
    let mut units = Vec::new();
    for item in state.items().iter().filter(|i| i.status.is_claimable()) {
        units.push(transfer_unit(ctx, &identity, &mut planner, signer, item, Direction::Claim).await?);
    }

    let mut groups = Vec::new();
    if !units.is_empty() {
        let validate = program::validation(names::VALIDATE_DEPOSIT, &ctx.program_id, &identity, signer)?;
        groups.push(OperationGroup::legacy(GroupKind::ValidateDeposit, vec![validate]));
        groups.extend(pack_instructions(GroupKind::Claim, units, signer)?);
    }
    if !skip_finalize {
        let finalize = program::validation(names::VALIDATE_CLAIMED, &ctx.program_id, &identity, signer)?;
        groups.push(OperationGroup::legacy(GroupKind::ValidateClaimed, vec![finalize]));
    }
    debug!(swap = %address, groups = groups.len(), "Claim planned");
    Ok(groups)
}
