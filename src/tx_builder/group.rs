//! Operation groups: the unit of submission

use solana_sdk::{instruction::Instruction, message::VersionedMessage};
use std::fmt;

/// Lifecycle step an operation group performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Initialize,
    AddItems,
    ValidateInitialize,
    Deposit,
    ValidateDeposit,
    Claim,
    ValidateClaimed,
    Cancel,
    ValidateCanceled,
    Modify,
}

impl GroupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupKind::Initialize => "initialize",
            GroupKind::AddItems => "add_items",
            GroupKind::ValidateInitialize => "validate_initialize",
            GroupKind::Deposit => "deposit",
            GroupKind::ValidateDeposit => "validate_deposit",
            GroupKind::Claim => "claim",
            GroupKind::ValidateClaimed => "validate_claimed",
            GroupKind::Cancel => "cancel",
            GroupKind::ValidateCanceled => "validate_canceled",
            GroupKind::Modify => "modify",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsigned content of one ledger transaction
#[derive(Debug, Clone)]
pub enum GroupPayload {
    /// Instructions compiled into a legacy message at dispatch time
    Legacy(Vec<Instruction>),
    /// Message compiled by the caller; only the blockhash is replaced
    Precompiled(VersionedMessage),
}

/// One transaction's worth of operations, submitted as a unit
#[derive(Debug, Clone)]
pub struct OperationGroup {
    pub kind: GroupKind,
    pub payload: GroupPayload,
}

impl OperationGroup {
    pub fn legacy(kind: GroupKind, instructions: Vec<Instruction>) -> Self {
        Self {
            kind,
            payload: GroupPayload::Legacy(instructions),
        }
    }

    pub fn precompiled(kind: GroupKind, message: VersionedMessage) -> Self {
        Self {
            kind,
            payload: GroupPayload::Precompiled(message),
        }
    }

    /// Instructions of a legacy group, empty for precompiled ones
    pub fn instructions(&self) -> &[Instruction] {
        match &self.payload {
            GroupPayload::Legacy(instructions) => instructions,
            GroupPayload::Precompiled(_) => &[],
        }
    }

    pub fn is_precompiled(&self) -> bool {
        matches!(self.payload, GroupPayload::Precompiled(_))
    }
}

/// Kinds of an ordered group list, handy for logs and assertions
pub fn group_kinds(groups: &[OperationGroup]) -> Vec<GroupKind> {
    groups.iter().map(|g| g.kind).collect()
}
