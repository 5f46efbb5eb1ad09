//! Standalone finalizing calls

use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::swap::cancel::CANCEL_PHASES;
use crate::swap::load_in_phase;
use crate::swap::program::{self, names};
use crate::tx_builder::{GroupKind, OperationGroup};
use crate::types::TradeStatus;
use solana_sdk::pubkey::Pubkey;

async fn single(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &Pubkey,
    allowed: &[TradeStatus],
    name: &str,
    kind: GroupKind,
) -> SwapResult<Vec<OperationGroup>> {
    let (_, identity) = load_in_phase(ctx, address, allowed).await?;
    let ix = program::validation(name, &ctx.program_id, &identity, signer)?;
    Ok(vec![OperationGroup::legacy(kind, vec![ix])])
}

pub async fn build_validate_claimed(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &Pubkey,
) -> SwapResult<Vec<OperationGroup>> {
    single(
        ctx,
        address,
        signer,
        &[TradeStatus::WaitingToClaim],
        names::VALIDATE_CLAIMED,
        GroupKind::ValidateClaimed,
    )
    .await
    .map_err(|e| e.wrap(address))
}

pub async fn build_validate_canceled(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &Pubkey,
) -> SwapResult<Vec<OperationGroup>> {
    single(
        ctx,
        address,
        signer,
        &CANCEL_PHASES,
        names::VALIDATE_CANCELED,
        GroupKind::ValidateCanceled,
    )
    .await
    .map_err(|e| e.wrap(address))
}
