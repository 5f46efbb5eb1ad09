//! Per-item asset movement shared by deposit, claim and cancel

use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::swap::ata::AtaPlanner;
use crate::swap::identity::SwapIdentity;
use crate::swap::program::{self, names, TransferAccounts};
use crate::types::SwapItem;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// owner -> swap
    Deposit,
    /// swap -> destinary
    Claim,
    /// swap -> owner
    Cancel,
}

impl Direction {
    fn call(self, item: &SwapItem) -> &'static str {
        match (self, item.is_nft, item.is_compressed) {
            (Direction::Deposit, true, true) => names::DEPOSIT_COMPRESSED_NFT,
            (Direction::Deposit, true, false) => names::DEPOSIT_NFT,
            (Direction::Deposit, false, _) => names::DEPOSIT_TOKEN,
            (Direction::Claim, true, true) => names::CLAIM_COMPRESSED_NFT,
            (Direction::Claim, true, false) => names::CLAIM_NFT,
            (Direction::Claim, false, _) => names::CLAIM_TOKEN,
            (Direction::Cancel, true, true) => names::CANCEL_COMPRESSED_NFT,
            (Direction::Cancel, true, false) => names::CANCEL_NFT,
            (Direction::Cancel, false, _) => names::CANCEL_TOKEN,
        }
    }

    /// Party on the non-escrow side of the movement
    fn user(self, item: &SwapItem) -> Pubkey {
        match self {
            Direction::Deposit | Direction::Cancel => item.owner,
            Direction::Claim => item.destinary,
        }
    }
}

/// Instructions that move one item, token-account creations first
///
/// The returned unit must land in a single transaction.
pub async fn transfer_unit(
    ctx: &SwapContext,
    identity: &SwapIdentity,
    planner: &mut AtaPlanner<'_>,
    signer: &Pubkey,
    item: &SwapItem,
    direction: Direction,
) -> SwapResult<Vec<Instruction>> {
    let name = direction.call(item);
    let user = direction.user(item);

    if item.is_nft && item.is_compressed {
        let proof = ctx.proofs.asset_proof(&item.mint).await?;
        let ix = program::compressed_transfer(name, &ctx.program_id, identity, signer, &user, &proof)?;
        return Ok(vec![ix]);
    }

    if item.is_native() {
        let accounts = TransferAccounts {
            mint: item.mint,
            swap_ata: identity.address,
            user,
            user_ata: user,
        };
        let ix = program::transfer(name, &ctx.program_id, identity, signer, &accounts)?;
        return Ok(vec![ix]);
    }

    let mut unit = Vec::with_capacity(3);
    let (user_ata, create_user) = planner.ensure(&user, &item.mint).await?;
    unit.extend(create_user);
    let (swap_ata, create_swap) = planner.ensure(&identity.address, &item.mint).await?;
    unit.extend(create_swap);

    let accounts = TransferAccounts {
        mint: item.mint,
        swap_ata,
        user,
        user_ata,
    };
    unit.push(program::transfer(name, &ctx.program_id, identity, signer, &accounts)?);
    Ok(unit)
}
