//! Modify: fill placeholder slots left open at initialization

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::swap::load_in_phase;
use crate::swap::program::{self, names};
use crate::tx_builder::{pack_instructions, GroupKind, OperationGroup};
use crate::types::{ItemStatus, SwapItem, TradeStatus, NULL_KEY};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

/// How an on-ledger placeholder pairs with a supplied item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Token with no owner yet; matched on amount
    Token,
    /// NFT offered without a receiver; matched on owner and collection
    NftMaker,
    /// NFT wanted from a collection; matched on receiver and collection
    NftTaker,
}

fn slot_of(item: &SwapItem) -> Option<Slot> {
    if !item.is_nft && item.owner == NULL_KEY {
        Some(Slot::Token)
    } else if item.is_nft && item.owner == NULL_KEY && item.mint == NULL_KEY {
        Some(Slot::NftTaker)
    } else if item.is_nft && item.destinary == NULL_KEY {
        Some(Slot::NftMaker)
    } else {
        None
    }
}

fn fills(slot: Slot, placeholder: &SwapItem, candidate: &SwapItem) -> bool {
    if candidate.is_placeholder() || candidate.is_nft != placeholder.is_nft {
        return false;
    }
    match slot {
        Slot::Token => candidate.amount == placeholder.amount,
        Slot::NftMaker => {
            candidate.owner == placeholder.owner && candidate.collection == placeholder.collection
        }
        Slot::NftTaker => {
            candidate.destinary == placeholder.destinary
                && candidate.collection == placeholder.collection
        }
    }
}

/// Token `Modify` group(s) then NFT `Modify` group(s)
///
/// Populated slots are never touched; each supplied item fills at most one
/// placeholder.
pub async fn build_modify(
    ctx: &SwapContext,
    address: &Pubkey,
    party: &Pubkey,
    desired: &[SwapItem],
) -> SwapResult<Vec<OperationGroup>> {
    build(ctx, address, party, desired)
        .await
        .map_err(|e| e.wrap(address))
}

async fn build(
    ctx: &SwapContext,
    address: &Pubkey,
    party: &Pubkey,
    desired: &[SwapItem],
) -> SwapResult<Vec<OperationGroup>> {
    let (state, identity) = load_in_phase(ctx, address, &[TradeStatus::WaitingToDeposit]).await?;

    let mut used = vec![false; desired.len()];
    let mut token_units = Vec::new();
    let mut nft_units = Vec::new();

    for placeholder in state.items() {
        let Some(slot) = slot_of(placeholder) else {
            continue;
        };
        let found = desired
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used[*i] && fills(slot, placeholder, candidate));
        let Some((i, candidate)) = found else {
            debug!(swap = %address, mint = %placeholder.mint, ?slot, "Placeholder left open");
            continue;
        };
        used[i] = true;

        let filled = candidate.clone().with_status(ItemStatus::pending(candidate.is_nft));
        if slot == Slot::Token {
            let ix = program::modify(names::MODIFY_TOKEN, &ctx.program_id, &identity, party, &filled)?;
            token_units.push(vec![ix]);
        } else {
            let ix = program::modify(names::MODIFY_NFT, &ctx.program_id, &identity, party, &filled)?;
            nft_units.push(vec![ix]);
        }
    }

    if token_units.is_empty() && nft_units.is_empty() {
        return Err(SwapError::NothingToModify {
            address: address.to_string(),
        });
    }
    info!(
        swap = %address,
        tokens = token_units.len(),
        nfts = nft_units.len(),
        "Placeholders matched"
    );

    let mut groups = pack_instructions(GroupKind::Modify, token_units, party)?;
    groups.extend(pack_instructions(GroupKind::Modify, nft_units, party)?);
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::program::call_name;
    use crate::test_utils::{mock_context, seed_swap, MockLedger};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_placeholders_filled() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let (maker, taker) = (Pubkey::new_unique(), Pubkey::new_unique());
        let collection = Pubkey::new_unique();
        let on_ledger = vec![
            SwapItem::token(NULL_KEY, NULL_KEY, maker, 500),
            SwapItem::nft(Pubkey::new_unique(), maker, NULL_KEY).with_collection(collection),
            SwapItem::nft(NULL_KEY, NULL_KEY, maker).with_collection(collection),
            SwapItem::nft(Pubkey::new_unique(), maker, taker),
        ];
        let identity = seed_swap(&ledger, &ctx, maker, &on_ledger, TradeStatus::WaitingToDeposit);

        let desired = vec![
            SwapItem::token(NULL_KEY, taker, maker, 500),
            SwapItem::nft(on_ledger[1].mint, maker, taker).with_collection(collection),
            SwapItem::nft(Pubkey::new_unique(), taker, maker).with_collection(collection),
        ];
        let groups = build_modify(&ctx, &identity.address, &taker, &desired).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.kind == GroupKind::Modify));

        let token_calls: Vec<_> = groups[0].instructions().iter().filter_map(call_name).collect();
        assert_eq!(token_calls, vec![names::MODIFY_TOKEN]);
        let nft_calls: Vec<_> = groups[1].instructions().iter().filter_map(call_name).collect();
        assert_eq!(nft_calls, vec![names::MODIFY_NFT, names::MODIFY_NFT]);
    }

    #[tokio::test]
    async fn test_nothing_to_modify() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let (maker, taker) = (Pubkey::new_unique(), Pubkey::new_unique());
        let on_ledger = vec![
            SwapItem::token(NULL_KEY, NULL_KEY, maker, 500),
            SwapItem::nft(Pubkey::new_unique(), maker, taker),
        ];
        let identity = seed_swap(&ledger, &ctx, maker, &on_ledger, TradeStatus::WaitingToDeposit);

        // wrong amount, and a populated slot is never rewritten
        let desired = vec![
            SwapItem::token(NULL_KEY, taker, maker, 499),
            SwapItem::nft(on_ledger[1].mint, maker, taker),
        ];
        let err = build_modify(&ctx, &identity.address, &taker, &desired).await.unwrap_err();
        assert!(matches!(err, SwapError::NothingToModify { .. }));
    }

    #[test]
    fn test_slot_classification() {
        let p = Pubkey::new_unique();
        assert_eq!(slot_of(&SwapItem::token(NULL_KEY, NULL_KEY, p, 1)), Some(Slot::Token));
        assert_eq!(slot_of(&SwapItem::nft(NULL_KEY, NULL_KEY, p)), Some(Slot::NftTaker));
        assert_eq!(slot_of(&SwapItem::nft(Pubkey::new_unique(), p, NULL_KEY)), Some(Slot::NftMaker));
        assert_eq!(slot_of(&SwapItem::nft(Pubkey::new_unique(), p, p)), None);
    }
}
