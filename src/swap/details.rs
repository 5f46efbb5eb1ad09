//! Per-party view of a swap

use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::swap::identity::require_state;
use crate::types::{ItemStatus, SwapItem, SwapState};
use solana_sdk::pubkey::Pubkey;

/// Items of one party bucketed by track and progress
///
/// Deposit and cancel buckets hold items the party owns; receive buckets
/// hold items it is the destinary of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSwapDetails {
    pub nft_to_deposit: Vec<SwapItem>,
    pub nft_deposited: Vec<SwapItem>,
    pub nft_to_receive: Vec<SwapItem>,
    pub nft_received: Vec<SwapItem>,
    pub nft_canceled: Vec<SwapItem>,

    pub sol_to_deposit: Vec<SwapItem>,
    pub sol_deposited: Vec<SwapItem>,
    pub sol_to_claim: Vec<SwapItem>,
    pub sol_claimed: Vec<SwapItem>,
    pub sol_canceled: Vec<SwapItem>,
}

impl UserSwapDetails {
    pub fn from_state(state: &SwapState, user: &Pubkey) -> Self {
        let owned = |status: ItemStatus| -> Vec<SwapItem> {
            state
                .items()
                .iter()
                .filter(|i| &i.owner == user && i.status == status)
                .cloned()
                .collect()
        };
        let received = |status: ItemStatus| -> Vec<SwapItem> {
            state
                .items()
                .iter()
                .filter(|i| &i.destinary == user && i.status == status)
                .cloned()
                .collect()
        };

        Self {
            nft_to_deposit: owned(ItemStatus::NftPending),
            nft_deposited: owned(ItemStatus::NftDeposited),
            nft_to_receive: received(ItemStatus::NftDeposited),
            nft_received: received(ItemStatus::NftClaimed),
            nft_canceled: owned(ItemStatus::NftCanceledRecovered),
            sol_to_deposit: owned(ItemStatus::SolPending),
            sol_deposited: owned(ItemStatus::SolDeposited),
            sol_to_claim: owned(ItemStatus::SolToClaim),
            sol_claimed: owned(ItemStatus::SolClaimed),
            sol_canceled: owned(ItemStatus::SolCanceledRecovered),
        }
    }

    /// Nothing left for the party to escrow
    pub fn fully_deposited(&self) -> bool {
        self.nft_to_deposit.is_empty() && self.sol_to_deposit.is_empty()
    }
}

pub async fn user_swap_details(
    ctx: &SwapContext,
    address: &Pubkey,
    user: &Pubkey,
) -> SwapResult<UserSwapDetails> {
    let state = require_state(ctx, address).await?;
    Ok(UserSwapDetails::from_state(&state, user))
}
