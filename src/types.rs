//! Core swap types shared by the resolver, builders and dispatcher

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, system_program};
use std::fmt;

/// Sentinel used by the program for "native SOL" mints and empty slots
pub const NULL_KEY: Pubkey = system_program::ID;

/// Per-item status as stored on-ledger
///
/// NFT and fungible items follow parallel tracks with identical topology:
/// `Pending -> Deposited -> (ToClaim -> Claimed) | CanceledRecovered`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    NftPending,
    NftDeposited,
    NftClaimed,
    NftCanceled,
    NftCanceledRecovered,
    SolPending,
    SolDeposited,
    SolToClaim,
    SolClaimed,
    SolCanceled,
    SolCanceledRecovered,
}

impl ItemStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NftPending => 10,
            Self::NftDeposited => 11,
            Self::NftClaimed => 12,
            Self::NftCanceled => 13,
            Self::NftCanceledRecovered => 14,
            Self::SolPending => 20,
            Self::SolDeposited => 21,
            Self::SolToClaim => 22,
            Self::SolClaimed => 23,
            Self::SolCanceled => 24,
            Self::SolCanceledRecovered => 25,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            10 => Self::NftPending,
            11 => Self::NftDeposited,
            12 => Self::NftClaimed,
            13 => Self::NftCanceled,
            14 => Self::NftCanceledRecovered,
            20 => Self::SolPending,
            21 => Self::SolDeposited,
            22 => Self::SolToClaim,
            23 => Self::SolClaimed,
            24 => Self::SolCanceled,
            25 => Self::SolCanceledRecovered,
            _ => return None,
        })
    }

    /// Initial status for a freshly registered item
    pub fn pending(is_nft: bool) -> Self {
        if is_nft {
            Self::NftPending
        } else {
            Self::SolPending
        }
    }

    pub fn is_nft_track(self) -> bool {
        self.as_u8() < 20
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::NftPending | Self::SolPending)
    }

    pub fn is_deposited(self) -> bool {
        matches!(self, Self::NftDeposited | Self::SolDeposited)
    }

    pub fn is_claimed(self) -> bool {
        matches!(self, Self::NftClaimed | Self::SolClaimed)
    }

    pub fn is_canceled(self) -> bool {
        matches!(
            self,
            Self::NftCanceled
                | Self::NftCanceledRecovered
                | Self::SolCanceled
                | Self::SolCanceledRecovered
        )
    }

    /// Deposited and waiting to be distributed
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::NftDeposited | Self::SolDeposited | Self::SolToClaim)
    }

    /// Position along the forward progression of its track
    pub fn rank(self) -> u8 {
        match self {
            Self::NftPending | Self::SolPending => 0,
            Self::NftDeposited | Self::SolDeposited => 1,
            Self::SolToClaim | Self::NftCanceled | Self::SolCanceled => 2,
            Self::NftClaimed
            | Self::SolClaimed
            | Self::NftCanceledRecovered
            | Self::SolCanceledRecovered => 3,
        }
    }

    /// At least deposited on the claim branch
    pub fn at_least_deposited(self) -> bool {
        self.rank() >= 1 && !self.is_canceled()
    }
}

impl BorshSerialize for ItemStatus {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        BorshSerialize::serialize(&self.as_u8(), writer)
    }
}

impl BorshDeserialize for ItemStatus {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let raw = u8::deserialize_reader(reader)?;
        Self::from_u8(raw).ok_or_else(|| {
            borsh::io::Error::new(
                borsh::io::ErrorKind::InvalidData,
                format!("unknown item status {raw}"),
            )
        })
    }
}

/// Swap-level phase, derived on-ledger from aggregate item statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    Initializing,
    WaitingToDeposit,
    WaitingToClaim,
    Closed,
    Canceling,
    Canceled,
}

impl TradeStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::WaitingToDeposit => 1,
            Self::WaitingToClaim => 2,
            Self::Closed => 3,
            Self::Canceling => 100,
            Self::Canceled => 101,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Initializing,
            1 => Self::WaitingToDeposit,
            2 => Self::WaitingToClaim,
            3 => Self::Closed,
            100 => Self::Canceling,
            101 => Self::Canceled,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Canceled)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl BorshSerialize for TradeStatus {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        BorshSerialize::serialize(&self.as_u8(), writer)
    }
}

impl BorshDeserialize for TradeStatus {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let raw = u8::deserialize_reader(reader)?;
        Self::from_u8(raw).ok_or_else(|| {
            borsh::io::Error::new(
                borsh::io::ErrorKind::InvalidData,
                format!("unknown trade status {raw}"),
            )
        })
    }
}

/// One pledged or receivable asset unit
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SwapItem {
    pub is_nft: bool,
    /// NFTs only; ownership proven by a merkle proof instead of a token account
    pub is_compressed: bool,
    /// Token mint, NFT mint or compressed asset id
    pub mint: Pubkey,
    pub collection: Pubkey,
    pub merkle_tree: Pubkey,
    /// Leaf index for compressed NFTs
    pub index: u64,
    pub amount: u64,
    pub owner: Pubkey,
    pub destinary: Pubkey,
    pub status: ItemStatus,
}

impl SwapItem {
    /// Fungible token (or native SOL when `mint` is [`NULL_KEY`])
    pub fn token(mint: Pubkey, owner: Pubkey, destinary: Pubkey, amount: u64) -> Self {
        Self {
            is_nft: false,
            is_compressed: false,
            mint,
            collection: NULL_KEY,
            merkle_tree: NULL_KEY,
            index: 0,
            amount,
            owner,
            destinary,
            status: ItemStatus::SolPending,
        }
    }

    pub fn nft(mint: Pubkey, owner: Pubkey, destinary: Pubkey) -> Self {
        Self {
            is_nft: true,
            is_compressed: false,
            mint,
            collection: NULL_KEY,
            merkle_tree: NULL_KEY,
            index: 0,
            amount: 1,
            owner,
            destinary,
            status: ItemStatus::NftPending,
        }
    }

    pub fn compressed_nft(
        asset_id: Pubkey,
        merkle_tree: Pubkey,
        index: u64,
        owner: Pubkey,
        destinary: Pubkey,
    ) -> Self {
        Self {
            is_compressed: true,
            merkle_tree,
            index,
            ..Self::nft(asset_id, owner, destinary)
        }
    }

    pub fn with_collection(mut self, collection: Pubkey) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    /// Sort key used for seed derivation: `mint ++ owner ++ destinary`
    pub fn canonical_key(&self) -> String {
        format!("{}{}{}", self.mint, self.owner, self.destinary)
    }

    /// Native SOL rather than an SPL token
    pub fn is_native(&self) -> bool {
        !self.is_nft && self.mint == NULL_KEY
    }

    /// Slot left open by the initializer, to be filled by `modify`
    pub fn is_placeholder(&self) -> bool {
        self.owner == NULL_KEY || self.destinary == NULL_KEY
    }
}

/// On-ledger swap account body (after the 8-byte account discriminator)
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SwapData {
    pub initializer: Pubkey,
    pub status: TradeStatus,
    pub nb_items: u32,
    pub pre_seed: String,
    pub seed: [u8; 32],
    pub items: Vec<SwapItem>,
    pub accepted_payment: Pubkey,
}

/// Decoded swap account together with the address it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapState {
    pub address: Pubkey,
    pub data: SwapData,
}

impl SwapState {
    pub fn status(&self) -> TradeStatus {
        self.data.status
    }

    pub fn items(&self) -> &[SwapItem] {
        &self.data.items
    }

    pub fn items_owned_by<'a>(&'a self, party: &'a Pubkey) -> impl Iterator<Item = &'a SwapItem> {
        self.data.items.iter().filter(move |item| &item.owner == party)
    }

    /// Initializer, owner or destinary of at least one item
    pub fn involves(&self, party: &Pubkey) -> bool {
        &self.data.initializer == party
            || self
                .data
                .items
                .iter()
                .any(|item| &item.owner == party || &item.destinary == party)
    }

    pub fn all_deposited(&self) -> bool {
        self.data.items.iter().all(|item| item.status.at_least_deposited())
    }
}
