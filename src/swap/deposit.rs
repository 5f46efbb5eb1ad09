//! Deposit: escrow every pending item a party owns

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::swap::ata::AtaPlanner;
use crate::swap::load_in_phase;
use crate::swap::transfer::{transfer_unit, Direction};
use crate::tx_builder::{GroupKind, OperationGroup};
use crate::types::{SwapItem, TradeStatus};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// One `Deposit` group per pending item owned by `party`
pub async fn build_deposit(
    ctx: &SwapContext,
    address: &Pubkey,
    party: &Pubkey,
) -> SwapResult<Vec<OperationGroup>> {
    build(ctx, address, party).await.map_err(|e| e.wrap(address))
}

async fn build(ctx: &SwapContext, address: &Pubkey, party: &Pubkey) -> SwapResult<Vec<OperationGroup>> {
    let (state, identity) = load_in_phase(ctx, address, &[TradeStatus::WaitingToDeposit]).await?;

    let owned: Vec<&SwapItem> = state.items_owned_by(party).collect();
    if owned.is_empty() {
        return Err(SwapError::NotPartOfSwap {
            address: address.to_string(),
            party: party.to_string(),
        });
    }

    let pending: Vec<&SwapItem> = owned.iter().copied().filter(|i| i.status.is_pending()).collect();
    if pending.is_empty() {
        let party = party.to_string();
        let address = address.to_string();
        return Err(if owned.iter().any(|i| i.status.is_deposited()) {
            SwapError::AlreadyDeposited { address, party }
        } else {
            SwapError::NothingToDeposit { address, party }
        });
    }

    let mut planner = AtaPlanner::new(ctx, *party);
    let mut groups = Vec::with_capacity(pending.len());
    for item in pending {
        let unit = transfer_unit(ctx, &identity, &mut planner, party, item, Direction::Deposit).await?;
        groups.push(OperationGroup::legacy(GroupKind::Deposit, unit));
    }
    debug!(swap = %address, party = %party, groups = groups.len(), "Deposit planned");
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::program::{call_name, names};
    use crate::test_utils::{mock_context, seed_swap, MockLedger};
    use crate::types::{ItemStatus, NULL_KEY};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_one_group_per_pending_item() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let p1 = Pubkey::new_unique();
        let p2 = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let items = vec![
            SwapItem::token(mint, p1, p2, 5),
            SwapItem::token(NULL_KEY, p1, p2, 1_000),
            SwapItem::nft(Pubkey::new_unique(), p2, p1),
        ];
        let identity = seed_swap(&ledger, &ctx, p1, &items, TradeStatus::WaitingToDeposit);

        let groups = build_deposit(&ctx, &identity.address, &p1).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.kind == GroupKind::Deposit));

        let names: Vec<_> = groups
            .iter()
            .flat_map(|g| g.instructions().iter().filter_map(call_name))
            .collect();
        assert_eq!(names, vec![names::DEPOSIT_TOKEN; 2]);

        // native SOL needs no token accounts; the SPL item plans both of its own
        let token_group = groups
            .iter()
            .find(|g| g.instructions().len() > 1)
            .unwrap();
        assert_eq!(token_group.instructions().len(), 3);
    }

    #[tokio::test]
    async fn test_party_errors() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let p1 = Pubkey::new_unique();
        let p2 = Pubkey::new_unique();
        let items = vec![
            SwapItem::token(Pubkey::new_unique(), p1, p2, 5),
            SwapItem::nft(Pubkey::new_unique(), p2, p1).with_status(ItemStatus::NftDeposited),
        ];
        let identity = seed_swap(&ledger, &ctx, p1, &items, TradeStatus::WaitingToDeposit);

        let stranger = Pubkey::new_unique();
        let err = build_deposit(&ctx, &identity.address, &stranger).await.unwrap_err();
        assert!(matches!(err, SwapError::NotPartOfSwap { .. }));

        let err = build_deposit(&ctx, &identity.address, &p2).await.unwrap_err();
        assert!(matches!(err, SwapError::AlreadyDeposited { .. }));
    }

    #[tokio::test]
    async fn test_nothing_to_deposit_after_cancel() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let p1 = Pubkey::new_unique();
        let items = vec![SwapItem::token(Pubkey::new_unique(), p1, Pubkey::new_unique(), 5)
            .with_status(ItemStatus::SolCanceledRecovered)];
        let identity = seed_swap(&ledger, &ctx, p1, &items, TradeStatus::WaitingToDeposit);

        let err = build_deposit(&ctx, &identity.address, &p1).await.unwrap_err();
        assert!(matches!(err, SwapError::NothingToDeposit { .. }));
    }

    #[tokio::test]
    async fn test_missing_swap_not_found() {
        let ctx = mock_context(Arc::new(MockLedger::new()));
        let err = build_deposit(&ctx, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NotFound { .. }));
    }
}
