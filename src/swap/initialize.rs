//! Initialize: account creation and item registration

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::swap::identity::{derive_identity, fetch_state, SwapIdentity};
use crate::swap::program::{self, names};
use crate::tx_builder::{fits_in_packet, pack_instructions, GroupKind, OperationGroup};
use crate::types::{ItemStatus, SwapItem, TradeStatus, NULL_KEY};
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Caller description of a new swap
#[derive(Debug, Clone)]
pub struct SwapInfo {
    pub pre_seed: String,
    pub items: Vec<SwapItem>,
    /// Defaults to the first fungible, non-native mint in canonical order
    pub accepted_payment: Option<Pubkey>,
}

#[derive(Debug, Clone)]
pub struct InitializePlan {
    pub identity: SwapIdentity,
    pub groups: Vec<OperationGroup>,
    /// The account already existed in `Initializing`
    pub resumed: bool,
}

fn validate_items(items: &[SwapItem]) -> SwapResult<()> {
    if items.is_empty() {
        return Err(SwapError::invalid_input("swap must contain at least one item"));
    }
    for item in items {
        if !item.is_nft && item.amount == 0 {
            return Err(SwapError::invalid_input(format!(
                "token item {} has a zero amount",
                item.mint
            )));
        }
        if item.is_compressed && !item.is_nft {
            return Err(SwapError::invalid_input(format!(
                "item {} is compressed but not an NFT",
                item.mint
            )));
        }
    }
    // open slots may repeat a key; filled items may not
    let mut seen = HashSet::new();
    if let Some(dup) = items
        .iter()
        .filter(|item| !item.is_placeholder())
        .find(|item| !seen.insert(item.canonical_key()))
    {
        return Err(SwapError::invalid_input(format!(
            "duplicate item {} from {} to {}",
            dup.mint, dup.owner, dup.destinary
        )));
    }
    Ok(())
}

/// What distinguishes two registrations of the same key
fn registration_key(item: &SwapItem) -> (String, bool, Pubkey, u64) {
    (item.canonical_key(), item.is_nft, item.collection, item.amount)
}

fn default_accepted_payment(identity: &SwapIdentity) -> Pubkey {
    identity
        .items
        .iter()
        .find(|item| !item.is_nft && item.mint != NULL_KEY)
        .map(|item| item.mint)
        .unwrap_or(NULL_KEY)
}

pub async fn build_initialize(
    ctx: &SwapContext,
    info: &SwapInfo,
    initializer: &Pubkey,
) -> SwapResult<InitializePlan> {
    validate_items(&info.items)?;
    let pending: Vec<SwapItem> = info
        .items
        .iter()
        .map(|item| item.clone().with_status(ItemStatus::pending(item.is_nft)))
        .collect();
    let identity = derive_identity(&info.pre_seed, &pending, &ctx.program_id)?;
    let address = identity.address;

    build_for_identity(ctx, info, identity, initializer)
        .await
        .map_err(|e| e.wrap(address))
}

async fn build_for_identity(
    ctx: &SwapContext,
    info: &SwapInfo,
    identity: SwapIdentity,
    initializer: &Pubkey,
) -> SwapResult<InitializePlan> {
    let existing = fetch_state(ctx, &identity.address).await?;

    let (mut registered, resumed) = match &existing {
        None => (HashMap::new(), false),
        Some(state) if state.data.status == TradeStatus::Initializing => {
            let mut counts: HashMap<_, usize> = HashMap::new();
            for item in &state.data.items {
                *counts.entry(registration_key(item)).or_default() += 1;
            }
            (counts, true)
        }
        Some(state) => {
            return Err(SwapError::InvalidPhase {
                address: state.address.to_string(),
                current: state.data.status,
                allowed: vec![TradeStatus::Initializing],
            })
        }
    };

    let add_units = identity
        .items
        .iter()
        .filter(|item| match registered.get_mut(&registration_key(item)) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .map(|item| {
            program::initialize_add(&ctx.program_id, &identity, initializer, item).map(|ix| vec![ix])
        })
        .collect::<SwapResult<Vec<_>>>()?;
    let validate = program::validation(
        names::VALIDATE_INITIALIZE,
        &ctx.program_id,
        &identity,
        initializer,
    )?;

    let mut groups = Vec::new();
    if resumed {
        info!(
            swap = %identity.address,
            missing = add_units.len(),
            "Resuming initialization"
        );
        groups.extend(pack_instructions(GroupKind::AddItems, add_units, initializer)?);
        groups.push(OperationGroup::legacy(GroupKind::ValidateInitialize, vec![validate]));
    } else {
        let accepted_payment = info
            .accepted_payment
            .unwrap_or_else(|| default_accepted_payment(&identity));
        let init = program::initialize(&ctx.program_id, &identity, initializer, &accepted_payment)?;

        let mut single = vec![init.clone()];
        single.extend(add_units.iter().flatten().cloned());
        single.push(validate.clone());

        if fits_in_packet(&single, initializer)? {
            groups.push(OperationGroup::legacy(GroupKind::Initialize, single));
        } else {
            groups.push(OperationGroup::legacy(GroupKind::Initialize, vec![init]));
            groups.extend(pack_instructions(GroupKind::AddItems, add_units, initializer)?);
            groups.push(OperationGroup::legacy(GroupKind::ValidateInitialize, vec![validate]));
        }
    }

    Ok(InitializePlan {
        identity,
        groups,
        resumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::identity::encode_swap_account;
    use crate::test_utils::{mock_context, swap_account, MockLedger};
    use crate::tx_builder::group_kinds;
    use crate::types::SwapData;
    use std::sync::Arc;

    fn items(n: usize, p1: Pubkey, p2: Pubkey) -> Vec<SwapItem> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    SwapItem::token(Pubkey::new_unique(), p1, p2, 10 + i as u64)
                } else {
                    SwapItem::nft(Pubkey::new_unique(), p2, p1)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_small_swap_single_group() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger);
        let p1 = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: items(2, p1, Pubkey::new_unique()),
            accepted_payment: None,
        };

        let plan = build_initialize(&ctx, &info, &p1).await.unwrap();
        assert!(!plan.resumed);
        assert_eq!(group_kinds(&plan.groups), vec![GroupKind::Initialize]);
        // initialize + 2 adds + validate
        assert_eq!(plan.groups[0].instructions().len(), 4);
    }

    #[tokio::test]
    async fn test_large_swap_split_in_order() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger);
        let p1 = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: items(12, p1, Pubkey::new_unique()),
            accepted_payment: None,
        };

        let plan = build_initialize(&ctx, &info, &p1).await.unwrap();
        let kinds = group_kinds(&plan.groups);
        assert_eq!(kinds.first(), Some(&GroupKind::Initialize));
        assert_eq!(kinds.last(), Some(&GroupKind::ValidateInitialize));
        assert!(kinds[1..kinds.len() - 1].iter().all(|k| *k == GroupKind::AddItems));
        let added: usize = plan.groups[1..kinds.len() - 1]
            .iter()
            .map(|g| g.instructions().len())
            .sum();
        assert_eq!(added, 12);
    }

    #[tokio::test]
    async fn test_existing_swap_rejected() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let p1 = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: items(2, p1, Pubkey::new_unique()),
            accepted_payment: None,
        };
        let identity = derive_identity(&info.pre_seed, &info.items, &ctx.program_id).unwrap();
        ledger.set_account(
            identity.address,
            swap_account(&ctx.program_id, &identity, p1, TradeStatus::WaitingToDeposit),
        );

        let err = build_initialize(&ctx, &info, &p1).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn test_resume_adds_only_missing_items() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let p1 = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: items(4, p1, Pubkey::new_unique()),
            accepted_payment: None,
        };
        let identity = derive_identity(&info.pre_seed, &info.items, &ctx.program_id).unwrap();
        let partial = SwapData {
            initializer: p1,
            status: TradeStatus::Initializing,
            nb_items: 4,
            pre_seed: identity.pre_seed.clone(),
            seed: identity.seed,
            items: identity.items[..1].to_vec(),
            accepted_payment: NULL_KEY,
        };
        let mut account = swap_account(&ctx.program_id, &identity, p1, TradeStatus::Initializing);
        account.data = encode_swap_account(&partial).unwrap();
        ledger.set_account(identity.address, account);

        let plan = build_initialize(&ctx, &info, &p1).await.unwrap();
        assert!(plan.resumed);
        assert_eq!(
            group_kinds(&plan.groups),
            vec![GroupKind::AddItems, GroupKind::ValidateInitialize]
        );
        assert_eq!(plan.groups[0].instructions().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_items_rejected() {
        let ctx = mock_context(Arc::new(MockLedger::new()));
        let p1 = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: vec![SwapItem::token(Pubkey::new_unique(), p1, Pubkey::new_unique(), 0)],
            accepted_payment: None,
        };
        let err = build_initialize(&ctx, &info, &p1).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidInput(_)));

        let item = SwapItem::nft(Pubkey::new_unique(), p1, Pubkey::new_unique());
        let info = SwapInfo {
            items: vec![item.clone(), item],
            ..info
        };
        let err = build_initialize(&ctx, &info, &p1).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_repeated_open_slots_accepted_and_resumed() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let maker = Pubkey::new_unique();
        let info = SwapInfo {
            pre_seed: "0000".into(),
            items: vec![
                SwapItem::nft(Pubkey::new_unique(), maker, Pubkey::new_unique()),
                SwapItem::nft(NULL_KEY, NULL_KEY, maker).with_collection(Pubkey::new_unique()),
                SwapItem::nft(NULL_KEY, NULL_KEY, maker).with_collection(Pubkey::new_unique()),
            ],
            accepted_payment: None,
        };

        let plan = build_initialize(&ctx, &info, &maker).await.unwrap();
        assert!(!plan.resumed);
        // initialize + 3 adds + validate, however they are split
        let total: usize = plan.groups.iter().map(|g| g.instructions().len()).sum();
        assert_eq!(total, 5);

        // one of the two open slots already registered
        let identity = plan.identity;
        let registered: Vec<SwapItem> = identity
            .items
            .iter()
            .filter(|item| item.is_placeholder())
            .take(1)
            .cloned()
            .collect();
        let partial = SwapData {
            initializer: maker,
            status: TradeStatus::Initializing,
            nb_items: 3,
            pre_seed: identity.pre_seed.clone(),
            seed: identity.seed,
            items: registered,
            accepted_payment: NULL_KEY,
        };
        let mut account = swap_account(&ctx.program_id, &identity, maker, TradeStatus::Initializing);
        account.data = encode_swap_account(&partial).unwrap();
        ledger.set_account(identity.address, account);

        let plan = build_initialize(&ctx, &info, &maker).await.unwrap();
        assert!(plan.resumed);
        assert_eq!(plan.groups[0].kind, GroupKind::AddItems);
        assert_eq!(plan.groups[0].instructions().len(), 2);
    }

    #[test]
    fn test_default_accepted_payment() {
        let program_id = Pubkey::new_unique();
        let p1 = Pubkey::new_unique();
        let p2 = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();
        let identity = derive_identity(
            "0000",
            &[
                SwapItem::nft(Pubkey::new_unique(), p1, p2),
                SwapItem::token(NULL_KEY, p2, p1, 100),
                SwapItem::token(usdc, p2, p1, 5),
            ],
            &program_id,
        )
        .unwrap();
        assert_eq!(default_accepted_payment(&identity), usdc);
    }
}
