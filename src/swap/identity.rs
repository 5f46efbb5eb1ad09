//! Swap account resolution: deterministic identity and decoded state

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::types::{SwapData, SwapItem, SwapState, TradeStatus};
use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::cmp::Ordering;
use tracing::debug;

/// Derived address data of a swap, never stored locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIdentity {
    pub seed: [u8; 32],
    pub address: Pubkey,
    pub bump: u8,
    pub pre_seed: String,
    /// Items in canonical order
    pub items: Vec<SwapItem>,
}

/// Anchor account discriminator of the swap account
pub fn account_discriminator() -> [u8; 8] {
    let digest = Sha256::digest(b"account:SwapData");
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Collation of base58 keys matching the default locale ordering of the
/// web clients that created existing swaps
///
/// Letters compare case-insensitively first, digits before letters. Only
/// when that ties does case decide, lowercase before uppercase.
pub fn collate_keys(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.bytes().map(|c| c.to_ascii_lowercase()).collect::<Vec<_>>();
    folded(a).cmp(&folded(b)).then_with(|| {
        a.bytes()
            .map(|c| c.is_ascii_uppercase())
            .cmp(b.bytes().map(|c| c.is_ascii_uppercase()))
    })
}

/// Items sorted by `mint ++ owner ++ destinary` under [`collate_keys`]
///
/// Equal keys (open slots) are further ordered by kind, collection and
/// amount so the result does not depend on input order.
pub fn canonical_order(items: &[SwapItem]) -> Vec<SwapItem> {
    let mut keyed: Vec<(String, SwapItem)> = items
        .iter()
        .map(|item| (item.canonical_key(), item.clone()))
        .collect();
    keyed.sort_by(|(ka, a), (kb, b)| {
        collate_keys(ka, kb)
            .then_with(|| a.is_nft.cmp(&b.is_nft))
            .then_with(|| a.collection.cmp(&b.collection))
            .then_with(|| a.amount.cmp(&b.amount))
    });
    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Seed bytes for an already canonically ordered item list
///
/// The digest is taken as lowercase hex and its first 32 characters are the
/// seed.
pub fn compute_seed(pre_seed: &str, sorted: &[SwapItem]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pre_seed.as_bytes());
    for item in sorted {
        hasher.update(item.canonical_key().as_bytes());
    }
    let hex_digest = hex::encode(hasher.finalize());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hex_digest.as_bytes()[..32]);
    seed
}

pub fn derive_identity(
    pre_seed: &str,
    items: &[SwapItem],
    program_id: &Pubkey,
) -> SwapResult<SwapIdentity> {
    if items.is_empty() {
        return Err(SwapError::invalid_input("swap must contain at least one item"));
    }
    let items = canonical_order(items);
    let seed = compute_seed(pre_seed, &items);
    let (address, bump) = Pubkey::find_program_address(&[&seed], program_id);
    Ok(SwapIdentity {
        seed,
        address,
        bump,
        pre_seed: pre_seed.to_string(),
        items,
    })
}

impl SwapIdentity {
    /// Re-derive from the seed stored on-ledger
    ///
    /// Items can change after initialization (`modify`), so the stored seed
    /// rather than the current item list is authoritative.
    pub fn from_state(state: &SwapState, program_id: &Pubkey) -> SwapResult<Self> {
        let (address, bump) = Pubkey::find_program_address(&[&state.data.seed], program_id);
        if address != state.address {
            return Err(SwapError::invalid_input(format!(
                "stored seed derives {address}, account was read from {}",
                state.address
            )));
        }
        Ok(Self {
            seed: state.data.seed,
            address,
            bump,
            pre_seed: state.data.pre_seed.clone(),
            items: canonical_order(&state.data.items),
        })
    }
}

/// Decode raw swap account bytes (discriminator, borsh body, optional padding)
pub fn decode_swap_account(address: Pubkey, raw: &[u8]) -> SwapResult<SwapState> {
    if raw.len() < 8 || raw[..8] != account_discriminator() {
        return Err(SwapError::decode(format!(
            "account {address} is not a swap account"
        )));
    }
    let mut body = &raw[8..];
    let data = SwapData::deserialize(&mut body)?;
    Ok(SwapState { address, data })
}

/// Encode a swap account the way the program stores it
pub fn encode_swap_account(data: &SwapData) -> SwapResult<Vec<u8>> {
    let mut raw = account_discriminator().to_vec();
    raw.extend(borsh::to_vec(data)?);
    Ok(raw)
}

/// Read and decode the swap account; `None` when it does not exist yet
pub async fn fetch_state(ctx: &SwapContext, address: &Pubkey) -> SwapResult<Option<SwapState>> {
    let Some(account) = ctx.rpc.get_account(address, ctx.commitment).await? else {
        debug!(swap = %address, "Swap account not found");
        return Ok(None);
    };
    if account.owner != ctx.program_id {
        return Err(SwapError::decode(format!(
            "account {address} is owned by {}, not the swap program",
            account.owner
        )));
    }
    decode_swap_account(*address, &account.data).map(Some)
}

/// Like [`fetch_state`] but absence is a [`SwapError::NotFound`]
pub async fn require_state(ctx: &SwapContext, address: &Pubkey) -> SwapResult<SwapState> {
    fetch_state(ctx, address)
        .await?
        .ok_or_else(|| SwapError::not_found(address))
}

pub fn assert_phase(state: &SwapState, allowed: &[TradeStatus]) -> SwapResult<()> {
    if allowed.contains(&state.data.status) {
        return Ok(());
    }
    Err(SwapError::InvalidPhase {
        address: state.address.to_string(),
        current: state.data.status,
        allowed: allowed.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NULL_KEY;

    fn sample_items() -> Vec<SwapItem> {
        let p1 = Pubkey::new_unique();
        let p2 = Pubkey::new_unique();
        vec![
            SwapItem::token(Pubkey::new_unique(), p1, p2, 5),
            SwapItem::nft(Pubkey::new_unique(), p2, p1),
            SwapItem::token(NULL_KEY, p2, p1, 1_000_000),
        ]
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = derive_identity("0000", &[], &Pubkey::new_unique()).unwrap_err();
        assert!(matches!(err, SwapError::InvalidInput(_)));
    }

    #[test]
    fn test_identity_independent_of_order() {
        let program_id = Pubkey::new_unique();
        let items = sample_items();
        let mut reversed = items.clone();
        reversed.reverse();

        let a = derive_identity("0000", &items, &program_id).unwrap();
        let b = derive_identity("0000", &reversed, &program_id).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            Pubkey::create_program_address(&[&a.seed, &[a.bump]], &program_id).unwrap(),
            a.address
        );
    }

    #[test]
    fn test_key_collation_ignores_case_first() {
        let mut keys = vec!["Bxx", "axx", "bxx", "1zz", "Axx", "Z9"];
        keys.sort_by(|a, b| collate_keys(a, b));
        assert_eq!(keys, vec!["1zz", "axx", "Axx", "bxx", "Bxx", "Z9"]);
    }

    #[test]
    fn test_canonical_order_mixed_case_mints() {
        let owner = Pubkey::new_unique();
        let destinary = Pubkey::new_unique();
        // "cGf..." sorts before "QWm..." although 'Q' < 'c' byte-wise
        let lower = Pubkey::new_from_array([9; 32]);
        let upper = Pubkey::new_from_array([6; 32]);
        let (l, u) = (lower.to_string(), upper.to_string());
        assert!(l.starts_with(|c: char| c.is_ascii_lowercase()));
        assert!(u.starts_with(|c: char| c.is_ascii_uppercase()));
        assert!(u < l);

        let items = vec![
            SwapItem::nft(upper, owner, destinary),
            SwapItem::nft(lower, owner, destinary),
        ];
        let sorted = canonical_order(&items);
        assert_eq!(sorted[0].mint, lower);
        assert_eq!(sorted[1].mint, upper);
    }

    #[test]
    fn test_seed_vector_with_mixed_case_keys() {
        let owner = Pubkey::new_from_array([1; 32]);
        let destinary = Pubkey::new_from_array([2; 32]);
        let items = vec![
            SwapItem::nft(Pubkey::new_from_array([6; 32]), owner, destinary),
            SwapItem::nft(Pubkey::new_from_array([9; 32]), owner, destinary),
        ];
        let identity = derive_identity("0000", &items, &Pubkey::new_unique()).unwrap();
        assert_eq!(&identity.seed, b"8ef0ad6ba1feb23e7150cbce81422897");
    }

    #[test]
    fn test_pre_seed_changes_address() {
        let program_id = Pubkey::new_unique();
        let items = sample_items();
        let a = derive_identity("0000", &items, &program_id).unwrap();
        let b = derive_identity("0001", &items, &program_id).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_seed_is_hex_prefix_of_digest() {
        let items = canonical_order(&sample_items());
        let seed = compute_seed("0000", &items);
        assert!(seed.iter().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

        let mut joined = String::from("0000");
        for item in &items {
            joined.push_str(&item.canonical_key());
        }
        let expected = hex::encode(Sha256::digest(joined.as_bytes()));
        assert_eq!(&seed[..], &expected.as_bytes()[..32]);
    }

    #[test]
    fn test_account_roundtrip_and_phase() {
        let program_id = Pubkey::new_unique();
        let identity = derive_identity("0000", &sample_items(), &program_id).unwrap();
        let data = SwapData {
            initializer: Pubkey::new_unique(),
            status: TradeStatus::WaitingToDeposit,
            nb_items: identity.items.len() as u32,
            pre_seed: identity.pre_seed.clone(),
            seed: identity.seed,
            items: identity.items.clone(),
            accepted_payment: NULL_KEY,
        };
        let mut raw = encode_swap_account(&data).unwrap();
        // accounts are allocated with slack
        raw.extend([0u8; 64]);

        let state = decode_swap_account(identity.address, &raw).unwrap();
        assert_eq!(state.data, data);
        assert!(assert_phase(&state, &[TradeStatus::WaitingToDeposit]).is_ok());

        let err = assert_phase(&state, &[TradeStatus::WaitingToClaim]).unwrap_err();
        match err {
            SwapError::InvalidPhase { current, allowed, .. } => {
                assert_eq!(current, TradeStatus::WaitingToDeposit);
                assert_eq!(allowed, vec![TradeStatus::WaitingToClaim]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let rederived = SwapIdentity::from_state(&state, &program_id).unwrap();
        assert_eq!(rederived.address, identity.address);
        assert_eq!(rederived.bump, identity.bump);
        assert!(SwapIdentity::from_state(&state, &Pubkey::new_unique()).is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_account() {
        let err = decode_swap_account(Pubkey::new_unique(), &[0u8; 40]).unwrap_err();
        assert!(matches!(err, SwapError::Decode(_)));
    }
}
