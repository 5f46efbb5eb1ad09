//! Instruction planning: priority fees and packet-size packing
//!
//! A group is sent as a single transaction, so every group must serialize
//! within `PACKET_DATA_SIZE` once the dispatcher has prepended its optional
//! compute-unit-price instruction. Packing always reserves room for it.

use crate::errors::{SwapError, SwapResult};
use crate::tx_builder::group::{GroupKind, OperationGroup};
use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::Instruction,
    message::Message,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    transaction::Transaction,
};

/// Prepend a compute-unit-price instruction when a non-zero fee is requested
///
/// Groups already carrying compute-budget instructions are left alone: the
/// runtime rejects a transaction with two of them.
pub fn with_priority_fee(mut instructions: Vec<Instruction>, prio_fee: Option<u64>) -> Vec<Instruction> {
    match prio_fee {
        Some(fee) if fee > 0 && !has_compute_budget(&instructions) => {
            instructions.insert(0, ComputeBudgetInstruction::set_compute_unit_price(fee));
            instructions
        }
        _ => instructions,
    }
}

fn has_compute_budget(instructions: &[Instruction]) -> bool {
    instructions
        .iter()
        .any(|ix| ix.program_id == compute_budget::id())
}

/// Serialized size of a single-signer-per-required-key legacy transaction
pub fn transaction_size(instructions: &[Instruction], payer: &Pubkey) -> SwapResult<usize> {
    let message = Message::new(instructions, Some(payer));
    let tx = Transaction::new_unsigned(message);
    let size = bincode::serialized_size(&tx)
        .map_err(|e| SwapError::invalid_input(format!("unserializable transaction: {e}")))?;
    Ok(size as usize)
}

/// Whether the instructions fit one packet with fee headroom
pub fn fits_in_packet(instructions: &[Instruction], payer: &Pubkey) -> SwapResult<bool> {
    let with_fee = with_priority_fee(instructions.to_vec(), Some(1));
    Ok(transaction_size(&with_fee, payer)? <= PACKET_DATA_SIZE)
}

/// Greedily pack atomic instruction units into as few groups as possible
///
/// Units are never split and keep their order. A unit that cannot fit a
/// transaction on its own is an error.
pub fn pack_instructions(
    kind: GroupKind,
    units: Vec<Vec<Instruction>>,
    payer: &Pubkey,
) -> SwapResult<Vec<OperationGroup>> {
    let mut groups = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();

    for unit in units {
        if unit.is_empty() {
            continue;
        }
        let mut candidate = current.clone();
        candidate.extend(unit.iter().cloned());
        if fits_in_packet(&candidate, payer)? {
            current = candidate;
            continue;
        }
        if current.is_empty() || !fits_in_packet(&unit, payer)? {
            return Err(SwapError::invalid_input(format!(
                "{kind} operation does not fit in a single transaction"
            )));
        }
        groups.push(OperationGroup::legacy(kind, std::mem::take(&mut current)));
        current = unit;
    }

    if !current.is_empty() {
        groups.push(OperationGroup::legacy(kind, current));
    }
    Ok(groups)
}
