//! Test Utilities Module
//!
//! In-memory ledger, fixtures and a small model of the swap program used to
//! exercise builders and the dispatcher without a cluster.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::assets::{AssetProofSource, CompressedAssetProof};
use crate::context::SwapContext;
use crate::errors::SwapResult;
use crate::rpc_manager::{LedgerRpc, RpcManagerError, RpcResult, SignatureStatus};
use crate::swap::identity::{decode_swap_account, derive_identity, encode_swap_account, SwapIdentity};
use crate::swap::program::{self, names, ACCOUNT_COMPRESSION_PROGRAM_ID};
use crate::types::{ItemStatus, SwapData, SwapItem, TradeStatus, NULL_KEY};
use async_trait::async_trait;
use borsh::BorshDeserialize;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::{AccountMeta, Instruction, InstructionError},
    message::{Message, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::{TransactionError, VersionedTransaction},
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Program id used by [`mock_context`]
pub const MOCK_PROGRAM_ID: Pubkey = Pubkey::new_from_array([9u8; 32]);

/// Program id of [`dummy_instruction`]
pub const DUMMY_PROGRAM_ID: Pubkey = Pubkey::new_from_array([3u8; 32]);

/// Last valid block height handed out with every blockhash
pub const MOCK_EXPIRY_HEIGHT: u64 = 250;

/// Applies a landed transaction to the in-memory accounts
pub type ProgramSimulator =
    Box<dyn Fn(&VersionedTransaction, &mut HashMap<Pubkey, Account>) -> Result<(), TransactionError> + Send + Sync>;

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    scripted: HashMap<Signature, VecDeque<SignatureStatus>>,
    outcomes: HashMap<Signature, Result<(), TransactionError>>,
    heights: VecDeque<u64>,
    last_height: Option<u64>,
    sent: Vec<VersionedTransaction>,
    status_queries: usize,
    failing_tags: HashMap<u8, TransactionError>,
    never_land: bool,
    send_failures: usize,
    blockhashes_issued: u64,
    misreport_signatures: bool,
}

/// In-memory [`LedgerRpc`]
///
/// A submitted transaction becomes visible on the next status query unless
/// its status was scripted or landing was disabled. Block heights pop from a
/// scripted queue whose last entry sticks (default 100).
pub struct MockLedger {
    state: Mutex<LedgerState>,
    simulator: Option<ProgramSimulator>,
}

impl std::fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLedger")
            .field("simulated", &self.simulator.is_some())
            .finish()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            simulator: None,
        }
    }

    pub fn with_simulator(simulator: ProgramSimulator) -> Self {
        Self {
            simulator: Some(simulator),
            ..Self::new()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.lock().accounts.insert(address, account);
    }

    pub fn account(&self, address: &Pubkey) -> Option<Account> {
        self.lock().accounts.get(address).cloned()
    }

    /// Statuses returned by successive queries of `signature`; the last one sticks
    pub fn script_status(&self, signature: Signature, statuses: Vec<SignatureStatus>) {
        self.lock().scripted.insert(signature, statuses.into());
    }

    pub fn script_heights(&self, heights: Vec<u64>) {
        self.lock().heights = heights.into();
    }

    /// Transactions containing an instruction whose first data byte is `tag` fail
    pub fn fail_transactions_matching(&self, tag: u8, err: TransactionError) {
        self.lock().failing_tags.insert(tag, err);
    }

    /// Nothing submitted ever becomes visible
    pub fn never_land(&self) {
        self.lock().never_land = true;
    }

    /// The next `send_transaction` call fails at the transport level
    pub fn fail_next_send(&self) {
        self.lock().send_failures += 1;
    }

    /// `send_transaction` answers with a signature other than the one submitted
    pub fn misreport_signatures(&self) {
        self.lock().misreport_signatures = true;
    }

    /// Every submission in order, resubmissions included
    pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
        self.lock().sent.clone()
    }

    pub fn sent_count(&self, signature: &Signature) -> usize {
        self.lock()
            .sent
            .iter()
            .filter(|tx| tx.signatures.first() == Some(signature))
            .count()
    }

    pub fn status_queries(&self) -> usize {
        self.lock().status_queries
    }

    /// Blockhash returned by the most recent `get_latest_blockhash` call
    pub fn last_blockhash(&self) -> Option<Hash> {
        match self.lock().blockhashes_issued {
            0 => None,
            issued => Some(mock_blockhash(issued)),
        }
    }

    fn failing_tag(state: &LedgerState, transaction: &VersionedTransaction) -> Option<TransactionError> {
        let keys = transaction.message.static_account_keys();
        transaction.message.instructions().iter().find_map(|ix| {
            let program = keys.get(ix.program_id_index as usize)?;
            if *program != DUMMY_PROGRAM_ID {
                return None;
            }
            state.failing_tags.get(ix.data.first()?).cloned()
        })
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_account(&self, address: &Pubkey, _commitment: CommitmentConfig) -> RpcResult<Option<Account>> {
        Ok(self.account(address))
    }

    async fn get_latest_blockhash(&self, _commitment: CommitmentConfig) -> RpcResult<(Hash, u64)> {
        let mut state = self.lock();
        state.blockhashes_issued += 1;
        Ok((mock_blockhash(state.blockhashes_issued), MOCK_EXPIRY_HEIGHT))
    }

    async fn get_block_height(&self, _commitment: CommitmentConfig) -> RpcResult<u64> {
        let mut state = self.lock();
        let height = match state.heights.pop_front() {
            Some(height) => height,
            None => state.last_height.unwrap_or(100),
        };
        state.last_height = Some(height);
        Ok(height)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> RpcResult<SignatureStatus> {
        let mut state = self.lock();
        state.status_queries += 1;
        if let Some(queue) = state.scripted.get_mut(signature) {
            let status = if queue.len() > 1 {
                queue.pop_front().flatten()
            } else {
                queue.front().cloned().flatten()
            };
            return Ok(status);
        }
        if state.never_land {
            return Ok(None);
        }
        Ok(state.outcomes.get(signature).cloned())
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _skip_preflight: bool,
    ) -> RpcResult<Signature> {
        let mut state = self.lock();
        if state.send_failures > 0 {
            state.send_failures -= 1;
            return Err(RpcManagerError::Transport {
                endpoint: "mock".to_string(),
                message: "connection reset".to_string(),
            });
        }
        let signature = transaction.signatures[0];
        state.sent.push(transaction.clone());
        if state.outcomes.contains_key(&signature) {
            return Ok(signature);
        }

        let outcome = if let Some(err) = Self::failing_tag(&state, transaction) {
            Err(err)
        } else if let Some(simulator) = &self.simulator {
            // all or nothing, like the real runtime
            let mut staged = state.accounts.clone();
            let result = simulator(transaction, &mut staged);
            if result.is_ok() {
                state.accounts = staged;
            }
            result
        } else {
            Ok(())
        };
        state.outcomes.insert(signature, outcome);
        if state.misreport_signatures {
            return Ok(Signature::default());
        }
        Ok(signature)
    }

    fn endpoint(&self) -> &str {
        "mock"
    }
}

/// Every call advances the blockhash, so re-signing the same message yields a new signature
fn mock_blockhash(sequence: u64) -> Hash {
    let mut bytes = [7u8; 32];
    bytes[..8].copy_from_slice(&sequence.to_le_bytes());
    Hash::new_from_array(bytes)
}

/// Instruction for [`DUMMY_PROGRAM_ID`] whose data is the single byte `tag`
pub fn dummy_instruction(payer: &Pubkey, tag: u8) -> Instruction {
    Instruction::new_with_bytes(DUMMY_PROGRAM_ID, &[tag], vec![AccountMeta::new(*payer, true)])
}

pub fn signed_dummy_transaction() -> VersionedTransaction {
    let payer = Keypair::new();
    let message = Message::new_with_blockhash(
        &[dummy_instruction(&payer.pubkey(), 0)],
        Some(&payer.pubkey()),
        &Hash::new_unique(),
    );
    VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[&payer])
        .expect("dummy transaction signs")
}

/// Concurrent merkle tree account with the given shape
pub fn merkle_tree_account(max_depth: u32, max_buffer_size: u32, canopy_depth: u32, authority: Pubkey) -> Account {
    let depth = max_depth as usize;
    let tree_size = 24 + max_buffer_size as usize * (32 + depth * 32 + 8) + (depth * 32 + 32 + 8);
    let canopy_nodes = (1usize << (canopy_depth + 1)) - 2;

    let mut data = vec![0u8; 56 + tree_size + canopy_nodes * 32];
    data[0] = 1;
    data[2..6].copy_from_slice(&max_buffer_size.to_le_bytes());
    data[6..10].copy_from_slice(&max_depth.to_le_bytes());
    data[10..42].copy_from_slice(authority.as_ref());

    Account {
        lamports: 1,
        data,
        owner: ACCOUNT_COMPRESSION_PROGRAM_ID,
        executable: false,
        rent_epoch: 0,
    }
}

/// Proof source answering every asset with a synthetic proof
#[derive(Debug, Default)]
pub struct StaticProofSource {
    proofs: Mutex<HashMap<Pubkey, CompressedAssetProof>>,
}

impl StaticProofSource {
    pub fn insert(&self, asset_id: Pubkey, proof: CompressedAssetProof) {
        self.proofs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(asset_id, proof);
    }
}

#[async_trait]
impl AssetProofSource for StaticProofSource {
    async fn asset_proof(&self, asset_id: &Pubkey) -> SwapResult<CompressedAssetProof> {
        let proofs = self.proofs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(proof) = proofs.get(asset_id) {
            return Ok(proof.clone());
        }
        Ok(CompressedAssetProof {
            root: asset_id.to_bytes(),
            data_hash: [1u8; 32],
            creator_hash: [2u8; 32],
            nonce: 0,
            leaf_index: 0,
            merkle_tree: Pubkey::new_from_array([4u8; 32]),
            tree_authority: Pubkey::new_from_array([5u8; 32]),
            proof_path: vec![Pubkey::new_from_array([6u8; 32])],
        })
    }
}

pub fn mock_context(ledger: Arc<MockLedger>) -> SwapContext {
    SwapContext::new(
        ledger,
        MOCK_PROGRAM_ID,
        CommitmentConfig::confirmed(),
        Arc::new(StaticProofSource::default()),
    )
}

fn program_account(program_id: &Pubkey, data: &SwapData) -> Account {
    Account {
        lamports: 1_000_000,
        data: encode_swap_account(data).expect("swap data encodes"),
        owner: *program_id,
        executable: false,
        rent_epoch: 0,
    }
}

/// Swap account holding the identity's items with their current statuses
pub fn swap_account(program_id: &Pubkey, identity: &SwapIdentity, initializer: Pubkey, status: TradeStatus) -> Account {
    let data = SwapData {
        initializer,
        status,
        nb_items: identity.items.len() as u32,
        pre_seed: identity.pre_seed.clone(),
        seed: identity.seed,
        items: identity.items.clone(),
        accepted_payment: NULL_KEY,
    };
    program_account(program_id, &data)
}

/// Store a swap over `items` in the given phase and return its identity
pub fn seed_swap(
    ledger: &MockLedger,
    ctx: &SwapContext,
    initializer: Pubkey,
    items: &[SwapItem],
    status: TradeStatus,
) -> SwapIdentity {
    let identity = derive_identity("0000", items, &ctx.program_id).expect("identity derives");
    ledger.set_account(identity.address, swap_account(&ctx.program_id, &identity, initializer, status));
    identity
}

/// Decoded swap state as stored by the mock ledger
pub fn stored_swap(ledger: &MockLedger, address: &Pubkey) -> Option<SwapData> {
    let account = ledger.account(address)?;
    decode_swap_account(*address, &account.data).ok().map(|s| s.data)
}

/// Model of the swap program for scenario tests
///
/// Tracks phase and item statuses the way the on-ledger program does; asset
/// balances are not modeled.
pub fn swap_program_simulator(program_id: Pubkey) -> ProgramSimulator {
    Box::new(move |transaction, accounts| {
        let keys = transaction.message.static_account_keys();
        for (index, ix) in transaction.message.instructions().iter().enumerate() {
            if keys.get(ix.program_id_index as usize) != Some(&program_id) {
                continue;
            }
            let metas: Vec<Pubkey> = ix
                .accounts
                .iter()
                .filter_map(|i| keys.get(*i as usize).copied())
                .collect();
            let instruction = Instruction::new_with_bytes(program_id, &ix.data, Vec::new());
            let fail = |code: u32| TransactionError::InstructionError(index as u8, InstructionError::Custom(code));
            let name = program::call_name(&instruction).ok_or_else(|| fail(100))?;
            apply_call(&program_id, name, &ix.data, &metas, accounts).map_err(fail)?;
        }
        Ok(())
    })
}

fn load(accounts: &HashMap<Pubkey, Account>, address: &Pubkey) -> Result<SwapData, u32> {
    let account = accounts.get(address).ok_or(1u32)?;
    decode_swap_account(*address, &account.data)
        .map(|s| s.data)
        .map_err(|_| 2u32)
}

fn require(data: &SwapData, allowed: &[TradeStatus]) -> Result<(), u32> {
    if allowed.contains(&data.status) {
        Ok(())
    } else {
        Err(3)
    }
}

fn settle(item: &mut SwapItem, from: fn(ItemStatus) -> bool, to_nft: ItemStatus, to_sol: ItemStatus) -> Result<(), u32> {
    if !from(item.status) {
        return Err(4);
    }
    item.status = if item.is_nft { to_nft } else { to_sol };
    Ok(())
}

fn apply_call(
    program_id: &Pubkey,
    name: &str,
    data: &[u8],
    metas: &[Pubkey],
    accounts: &mut HashMap<Pubkey, Account>,
) -> Result<(), u32> {
    let address = *metas.first().ok_or(5u32)?;
    let signer = *metas.get(1).ok_or(5u32)?;
    let mut args = data.get(8..).ok_or(6u32)?;

    if name == names::INITIALIZE {
        if accounts.contains_key(&address) {
            return Err(7);
        }
        let seed = <[u8; 32]>::deserialize(&mut args).map_err(|_| 6u32)?;
        let pre_seed = String::deserialize(&mut args).map_err(|_| 6u32)?;
        let nb_items = u32::deserialize(&mut args).map_err(|_| 6u32)?;
        let accepted_payment = Pubkey::deserialize(&mut args).map_err(|_| 6u32)?;
        let swap = SwapData {
            initializer: signer,
            status: TradeStatus::Initializing,
            nb_items,
            pre_seed,
            seed,
            items: Vec::new(),
            accepted_payment,
        };
        accounts.insert(address, program_account(program_id, &swap));
        return Ok(());
    }

    let mut swap = load(accounts, &address)?;
    let user = metas.get(2).copied();
    let mint = metas.get(3).copied();
    let matches_mint = |item: &SwapItem| item.is_compressed || Some(item.mint) == mint;

    match name {
        names::INITIALIZE_ADD => {
            require(&swap, &[TradeStatus::Initializing])?;
            let _seed = <[u8; 32]>::deserialize(&mut args).map_err(|_| 6u32)?;
            let item = SwapItem::deserialize(&mut args).map_err(|_| 6u32)?;
            swap.items.push(item);
        }
        names::VALIDATE_INITIALIZE => {
            require(&swap, &[TradeStatus::Initializing])?;
            if swap.items.len() != swap.nb_items as usize {
                return Err(8);
            }
            swap.status = TradeStatus::WaitingToDeposit;
        }
        names::DEPOSIT_TOKEN | names::DEPOSIT_NFT | names::DEPOSIT_COMPRESSED_NFT => {
            require(&swap, &[TradeStatus::WaitingToDeposit])?;
            let item = swap
                .items
                .iter_mut()
                .find(|i| Some(i.owner) == user && i.status.is_pending() && matches_mint(i))
                .ok_or(9u32)?;
            settle(item, ItemStatus::is_pending, ItemStatus::NftDeposited, ItemStatus::SolDeposited)?;
            if swap.items.iter().all(|i| i.status.at_least_deposited()) {
                swap.status = TradeStatus::WaitingToClaim;
            }
        }
        names::VALIDATE_DEPOSIT => {
            require(&swap, &[TradeStatus::WaitingToDeposit, TradeStatus::WaitingToClaim])?;
            if !swap.items.iter().all(|i| i.status.at_least_deposited()) {
                return Err(10);
            }
            swap.status = TradeStatus::WaitingToClaim;
        }
        names::CLAIM_TOKEN | names::CLAIM_NFT | names::CLAIM_COMPRESSED_NFT => {
            require(&swap, &[TradeStatus::WaitingToClaim])?;
            let item = swap
                .items
                .iter_mut()
                .find(|i| Some(i.destinary) == user && i.status.is_claimable() && matches_mint(i))
                .ok_or(11u32)?;
            settle(item, ItemStatus::is_claimable, ItemStatus::NftClaimed, ItemStatus::SolClaimed)?;
        }
        names::VALIDATE_CLAIMED => {
            require(&swap, &[TradeStatus::WaitingToClaim])?;
            if !swap.items.iter().all(|i| i.status.is_claimed()) {
                return Err(12);
            }
            swap.status = TradeStatus::Closed;
        }
        names::CANCEL_TOKEN | names::CANCEL_NFT | names::CANCEL_COMPRESSED_NFT => {
            require(&swap, &[TradeStatus::WaitingToDeposit, TradeStatus::Canceling])?;
            let item = swap
                .items
                .iter_mut()
                .find(|i| {
                    Some(i.owner) == user
                        && matches_mint(i)
                        && (i.status.is_deposited()
                            || matches!(i.status, ItemStatus::NftCanceled | ItemStatus::SolCanceled))
                })
                .ok_or(13u32)?;
            item.status = if item.is_nft {
                ItemStatus::NftCanceledRecovered
            } else {
                ItemStatus::SolCanceledRecovered
            };
            swap.status = TradeStatus::Canceling;
        }
        names::VALIDATE_CANCELED => {
            require(&swap, &[TradeStatus::WaitingToDeposit, TradeStatus::Canceling])?;
            for item in swap.items.iter_mut() {
                if item.status.is_pending() {
                    item.status = if item.is_nft {
                        ItemStatus::NftCanceledRecovered
                    } else {
                        ItemStatus::SolCanceledRecovered
                    };
                } else if item.status.is_deposited() {
                    return Err(14);
                }
            }
            swap.status = TradeStatus::Canceled;
        }
        names::MODIFY_TOKEN | names::MODIFY_NFT => {
            require(&swap, &[TradeStatus::WaitingToDeposit])?;
            let _seed = <[u8; 32]>::deserialize(&mut args).map_err(|_| 6u32)?;
            let filled = SwapItem::deserialize(&mut args).map_err(|_| 6u32)?;
            let slot = swap
                .items
                .iter_mut()
                .find(|i| {
                    i.is_placeholder()
                        && i.is_nft == filled.is_nft
                        && if filled.is_nft {
                            i.collection == filled.collection
                        } else {
                            i.amount == filled.amount
                        }
                })
                .ok_or(15u32)?;
            *slot = filled;
        }
        _ => return Err(100),
    }

    let account = accounts.get_mut(&address).ok_or(1u32)?;
    account.data = encode_swap_account(&swap).map_err(|_| 2u32)?;
    Ok(())
}
