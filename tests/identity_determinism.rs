//! Swap identity must not depend on the order items are supplied in

use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;
use swap_escrow::swap::derive_identity;
use swap_escrow::SwapItem;

fn key() -> impl Strategy<Value = Pubkey> {
    any::<[u8; 32]>().prop_map(Pubkey::new_from_array)
}

fn item() -> impl Strategy<Value = SwapItem> {
    (any::<bool>(), key(), key(), key(), 1u64..1_000_000).prop_map(|(is_nft, mint, owner, destinary, amount)| {
        if is_nft {
            SwapItem::nft(mint, owner, destinary)
        } else {
            SwapItem::token(mint, owner, destinary, amount)
        }
    })
}

proptest! {
    #[test]
    fn identity_is_permutation_invariant(
        items in prop::collection::vec(item(), 1..8),
        pre_seed in "[0-9]{4}",
        rotation in 0usize..8,
    ) {
        let program_id = Pubkey::new_from_array([9u8; 32]);
        let base = derive_identity(&pre_seed, &items, &program_id).unwrap();

        let mut shuffled = items.clone();
        shuffled.reverse();
        let len = shuffled.len();
        shuffled.rotate_left(rotation % len);
        let other = derive_identity(&pre_seed, &shuffled, &program_id).unwrap();

        prop_assert_eq!(base.address, other.address);
        prop_assert_eq!(base.seed, other.seed);
        prop_assert_eq!(base.bump, other.bump);
        prop_assert_eq!(base.items, other.items);
    }

    #[test]
    fn seed_is_lowercase_hex(items in prop::collection::vec(item(), 1..4)) {
        let identity = derive_identity("0000", &items, &Pubkey::new_from_array([9u8; 32])).unwrap();
        prop_assert!(identity.seed.iter().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b)));
    }
}

#[test]
fn pre_seed_changes_address() {
    let program_id = Pubkey::new_from_array([9u8; 32]);
    let items = vec![SwapItem::token(
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        10,
    )];
    let a = derive_identity("0000", &items, &program_id).unwrap();
    let b = derive_identity("0001", &items, &program_id).unwrap();
    assert_ne!(a.address, b.address);
}

#[test]
fn empty_item_list_rejected() {
    assert!(derive_identity("0000", &[], &Pubkey::new_unique()).is_err());
}
