//! Cancel: return escrowed items to their owners and close

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::swap::ata::AtaPlanner;
use crate::swap::load_in_phase;
use crate::swap::program::{self, names};
use crate::swap::transfer::{transfer_unit, Direction};
use crate::tx_builder::{pack_instructions, GroupKind, OperationGroup};
use crate::types::{ItemStatus, SwapItem, TradeStatus};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

pub(crate) const CANCEL_PHASES: [TradeStatus; 2] = [TradeStatus::WaitingToDeposit, TradeStatus::Canceling];

/// Still held by the swap account
fn is_escrowed(item: &SwapItem) -> bool {
    item.status.is_deposited() || matches!(item.status, ItemStatus::NftCanceled | ItemStatus::SolCanceled)
}

/// `[Cancel.., ValidateCanceled]`
///
/// Pending items hold nothing in escrow; the finalizing call marks them.
pub async fn build_cancel(
    ctx: &SwapContext,
    address: &Pubkey,
    party: &Pubkey,
    skip_finalize: bool,
) -> SwapResult<Vec<OperationGroup>> {
    build(ctx, address, party, skip_finalize)
        .await
        .map_err(|e| e.wrap(address))
}

async fn build(
    ctx: &SwapContext,
    address: &Pubkey,
    party: &Pubkey,
    skip_finalize: bool,
) -> SwapResult<Vec<OperationGroup>> {
    let (state, identity) = load_in_phase(ctx, address, &CANCEL_PHASES).await?;
    if !state.involves(party) {
        return Err(SwapError::NotPartOfSwap {
            address: address.to_string(),
            party: party.to_string(),
        });
    }

    let mut planner = AtaPlanner::new(ctx, *party);
    let mut units = Vec::new();
    for item in state.items().iter().filter(|i| is_escrowed(i)) {
        units.push(transfer_unit(ctx, &identity, &mut planner, party, item, Direction::Cancel).await?);
    }

    let mut groups = pack_instructions(GroupKind::Cancel, units, party)?;
    if !skip_finalize {
        let finalize = program::validation(names::VALIDATE_CANCELED, &ctx.program_id, &identity, party)?;
        groups.push(OperationGroup::legacy(GroupKind::ValidateCanceled, vec![finalize]));
    }
    debug!(swap = %address, party = %party, groups = groups.len(), "Cancel planned");
    Ok(groups)
}
