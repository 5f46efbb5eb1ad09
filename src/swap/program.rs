//! On-ledger program calls
//!
//! Anchor-style encoding: `sha256("global:<name>")[..8]` followed by the
//! borsh-encoded arguments, the swap seed always first. Account lists are
//! the roles the program expects, in order.

use crate::assets::CompressedAssetProof;
use crate::errors::SwapResult;
use crate::swap::identity::SwapIdentity;
use crate::types::SwapItem;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

pub const BUBBLEGUM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY");
pub const ACCOUNT_COMPRESSION_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("cmtDvXumGCrqC1Age74AVPhSRVXJMd8PJS91L8KbNCK");
pub const NOOP_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV");

/// Program call names as registered by the swap program
pub mod names {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZE_ADD: &str = "initialize_add";
    pub const VALIDATE_INITIALIZE: &str = "validate_initialize";
    pub const DEPOSIT_TOKEN: &str = "deposit_token";
    pub const DEPOSIT_NFT: &str = "deposit_nft";
    pub const DEPOSIT_COMPRESSED_NFT: &str = "deposit_compressed_nft";
    pub const CLAIM_TOKEN: &str = "claim_token";
    pub const CLAIM_NFT: &str = "claim_nft";
    pub const CLAIM_COMPRESSED_NFT: &str = "claim_compressed_nft";
    pub const CANCEL_TOKEN: &str = "cancel_token";
    pub const CANCEL_NFT: &str = "cancel_nft";
    pub const CANCEL_COMPRESSED_NFT: &str = "cancel_compressed_nft";
    pub const VALIDATE_DEPOSIT: &str = "validate_deposit";
    pub const VALIDATE_CLAIMED: &str = "validate_claimed";
    pub const VALIDATE_CANCELED: &str = "validate_canceled";
    pub const MODIFY_TOKEN: &str = "modify_token";
    pub const MODIFY_NFT: &str = "modify_nft";
}

pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn encode<T: BorshSerialize>(name: &str, args: &T) -> SwapResult<Vec<u8>> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

#[derive(BorshSerialize)]
struct SeedArgs {
    seed: [u8; 32],
}

#[derive(BorshSerialize)]
struct SeedBumpArgs {
    seed: [u8; 32],
    bump: u8,
}

#[derive(BorshSerialize)]
struct InitializeArgs {
    seed: [u8; 32],
    pre_seed: String,
    nb_items: u32,
    accepted_payment: Pubkey,
}

#[derive(BorshSerialize)]
struct ItemArgs {
    seed: [u8; 32],
    item: SwapItem,
}

#[derive(BorshSerialize)]
struct CompressedArgs {
    seed: [u8; 32],
    bump: u8,
    root: [u8; 32],
    data_hash: [u8; 32],
    creator_hash: [u8; 32],
    nonce: u64,
    index: u32,
}

impl CompressedArgs {
    fn new(identity: &SwapIdentity, proof: &CompressedAssetProof) -> Self {
        Self {
            seed: identity.seed,
            bump: identity.bump,
            root: proof.root,
            data_hash: proof.data_hash,
            creator_hash: proof.creator_hash,
            nonce: proof.nonce,
            index: proof.leaf_index,
        }
    }
}

/// Token-side accounts of a transfer; the swap and signer themselves for native SOL
#[derive(Debug, Clone, Copy)]
pub struct TransferAccounts {
    pub mint: Pubkey,
    pub swap_ata: Pubkey,
    pub user: Pubkey,
    pub user_ata: Pubkey,
}

fn swap_meta(identity: &SwapIdentity) -> AccountMeta {
    AccountMeta::new(identity.address, false)
}

fn signer_meta(signer: &Pubkey) -> AccountMeta {
    AccountMeta::new(*signer, true)
}

/// `[swap (w), signer (s, w), system_program]`
fn validation_accounts(identity: &SwapIdentity, signer: &Pubkey) -> Vec<AccountMeta> {
    vec![
        swap_meta(identity),
        signer_meta(signer),
        AccountMeta::new_readonly(system_program::ID, false),
    ]
}

/// `[swap (w), signer (s, w), user (w), mint, swap_ata (w), user_ata (w),
///   system_program, token_program]`
fn transfer_accounts(identity: &SwapIdentity, signer: &Pubkey, t: &TransferAccounts) -> Vec<AccountMeta> {
    vec![
        swap_meta(identity),
        signer_meta(signer),
        AccountMeta::new(t.user, t.user == *signer),
        AccountMeta::new_readonly(t.mint, false),
        AccountMeta::new(t.swap_ata, false),
        AccountMeta::new(t.user_ata, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(spl_token::ID, false),
    ]
}

/// `[swap (w), signer (s, w), user (w), tree_authority, merkle_tree (w),
///   noop, compression, bubblegum, system_program, ...proof_path]`
fn compressed_accounts(
    identity: &SwapIdentity,
    signer: &Pubkey,
    user: &Pubkey,
    proof: &CompressedAssetProof,
) -> Vec<AccountMeta> {
    let mut accounts = vec![
        swap_meta(identity),
        signer_meta(signer),
        AccountMeta::new(*user, user == signer),
        AccountMeta::new_readonly(proof.tree_authority, false),
        AccountMeta::new(proof.merkle_tree, false),
        AccountMeta::new_readonly(NOOP_PROGRAM_ID, false),
        AccountMeta::new_readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
        AccountMeta::new_readonly(BUBBLEGUM_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    accounts.extend(
        proof
            .proof_path
            .iter()
            .map(|node| AccountMeta::new_readonly(*node, false)),
    );
    accounts
}

pub fn initialize(
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
    accepted_payment: &Pubkey,
) -> SwapResult<Instruction> {
    let args = InitializeArgs {
        seed: identity.seed,
        pre_seed: identity.pre_seed.clone(),
        nb_items: identity.items.len() as u32,
        accepted_payment: *accepted_payment,
    };
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(names::INITIALIZE, &args)?,
        validation_accounts(identity, signer),
    ))
}

pub fn initialize_add(
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
    item: &SwapItem,
) -> SwapResult<Instruction> {
    let args = ItemArgs {
        seed: identity.seed,
        item: item.clone(),
    };
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(names::INITIALIZE_ADD, &args)?,
        validation_accounts(identity, signer),
    ))
}

/// Seed-only calls that assert or finalize a phase transition
pub fn validation(
    name: &str,
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
) -> SwapResult<Instruction> {
    let args = SeedArgs {
        seed: identity.seed,
    };
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(name, &args)?,
        validation_accounts(identity, signer),
    ))
}

/// `deposit_*`, `claim_*` and `cancel_*` for tokens and regular NFTs
pub fn transfer(
    name: &str,
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
    accounts: &TransferAccounts,
) -> SwapResult<Instruction> {
    let args = SeedBumpArgs {
        seed: identity.seed,
        bump: identity.bump,
    };
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(name, &args)?,
        transfer_accounts(identity, signer, accounts),
    ))
}

/// `*_compressed_nft` calls; `user` is the leaf owner before or after the move
pub fn compressed_transfer(
    name: &str,
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
    user: &Pubkey,
    proof: &CompressedAssetProof,
) -> SwapResult<Instruction> {
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(name, &CompressedArgs::new(identity, proof))?,
        compressed_accounts(identity, signer, user, proof),
    ))
}

/// `modify_token` / `modify_nft`: fill a placeholder slot
pub fn modify(
    name: &str,
    program_id: &Pubkey,
    identity: &SwapIdentity,
    signer: &Pubkey,
    item: &SwapItem,
) -> SwapResult<Instruction> {
    let args = ItemArgs {
        seed: identity.seed,
        item: item.clone(),
    };
    let mut accounts = validation_accounts(identity, signer);
    accounts.push(AccountMeta::new_readonly(sysvar::instructions::ID, false));
    Ok(Instruction::new_with_bytes(
        *program_id,
        &encode(name, &args)?,
        accounts,
    ))
}

/// Name of the program call an instruction encodes, if it is a known one
pub fn call_name(instruction: &Instruction) -> Option<&'static str> {
    const ALL: [&str; 17] = [
        names::INITIALIZE,
        names::INITIALIZE_ADD,
        names::VALIDATE_INITIALIZE,
        names::DEPOSIT_TOKEN,
        names::DEPOSIT_NFT,
        names::DEPOSIT_COMPRESSED_NFT,
        names::CLAIM_TOKEN,
        names::CLAIM_NFT,
        names::CLAIM_COMPRESSED_NFT,
        names::CANCEL_TOKEN,
        names::CANCEL_NFT,
        names::CANCEL_COMPRESSED_NFT,
        names::VALIDATE_DEPOSIT,
        names::VALIDATE_CLAIMED,
        names::VALIDATE_CANCELED,
        names::MODIFY_TOKEN,
        names::MODIFY_NFT,
    ];
    let tag = instruction.data.get(..8)?;
    ALL.into_iter()
        .find(|name| instruction_discriminator(name) == tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::identity::derive_identity;

    #[test]
    fn test_discriminator_matches_anchor_rule() {
        // sha256("global:initialize")[..8]
        assert_eq!(
            instruction_discriminator("initialize"),
            [175, 175, 109, 31, 13, 152, 155, 237]
        );
        assert_ne!(
            instruction_discriminator(names::CLAIM_NFT),
            instruction_discriminator(names::CLAIM_TOKEN)
        );
    }

    #[test]
    fn test_seed_is_first_argument() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let items = vec![SwapItem::token(Pubkey::new_unique(), signer, Pubkey::new_unique(), 3)];
        let identity = derive_identity("0000", &items, &program_id).unwrap();

        let ix = validation(names::VALIDATE_CLAIMED, &program_id, &identity, &signer).unwrap();
        assert_eq!(ix.program_id, program_id);
        assert_eq!(&ix.data[8..40], &identity.seed);
        assert_eq!(ix.data.len(), 40);
        assert_eq!(call_name(&ix), Some(names::VALIDATE_CLAIMED));
        assert!(ix.accounts[1].is_signer);

        let accounts = TransferAccounts {
            mint: items[0].mint,
            swap_ata: Pubkey::new_unique(),
            user: signer,
            user_ata: Pubkey::new_unique(),
        };
        let ix = transfer(names::DEPOSIT_TOKEN, &program_id, &identity, &signer, &accounts).unwrap();
        assert_eq!(ix.data[40], identity.bump);
        assert_eq!(ix.accounts[3].pubkey, items[0].mint);
        assert_eq!(call_name(&ix), Some(names::DEPOSIT_TOKEN));
    }

    #[test]
    fn test_compressed_call_carries_proof_path() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let items = vec![SwapItem::nft(Pubkey::new_unique(), signer, Pubkey::new_unique())];
        let identity = derive_identity("0000", &items, &program_id).unwrap();
        let proof = CompressedAssetProof {
            root: [1u8; 32],
            data_hash: [2u8; 32],
            creator_hash: [3u8; 32],
            nonce: 9,
            leaf_index: 9,
            merkle_tree: Pubkey::new_unique(),
            tree_authority: Pubkey::new_unique(),
            proof_path: vec![Pubkey::new_unique(), Pubkey::new_unique()],
        };
        let ix = compressed_transfer(
            names::CANCEL_COMPRESSED_NFT,
            &program_id,
            &identity,
            &signer,
            &signer,
            &proof,
        )
        .unwrap();
        assert_eq!(ix.accounts.len(), 9 + 2);
        assert_eq!(ix.accounts[9].pubkey, proof.proof_path[0]);
        // seed, bump, 3 hashes, nonce, index
        assert_eq!(ix.data.len(), 8 + 32 + 1 + 96 + 8 + 4);
    }
}
