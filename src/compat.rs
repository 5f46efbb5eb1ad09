//! Compatibility layer for `VersionedMessage`
//!
//! Uniform access to the header and static keys of Legacy and V0 messages,
//! used to check precompiled operation groups before signing.

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Static account keys (lookup-table addresses excluded for V0)
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Keys that must sign, in signature order
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let keys = get_static_account_keys(message);
    let required = usize::from(get_message_header(message).num_required_signatures);
    &keys[..required.min(keys.len())]
}

/// Fee payer is always the first signer
#[inline]
#[must_use]
pub fn get_fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_required_signers(message).first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        hash::Hash,
        instruction::{AccountMeta, Instruction},
        message::{v0, Message},
    };

    fn sample_instruction(signer: Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1, 2, 3],
            vec![
                AccountMeta::new(signer, true),
                AccountMeta::new_readonly(Pubkey::new_unique(), false),
            ],
        )
    }

    #[test]
    fn test_legacy_fee_payer() {
        let payer = Pubkey::new_unique();
        let msg = Message::new(&[sample_instruction(payer)], Some(&payer));
        let versioned = VersionedMessage::Legacy(msg);
        assert_eq!(get_fee_payer(&versioned), Some(&payer));
        assert_eq!(get_required_signers(&versioned), &[payer]);
    }

    #[test]
    fn test_v0_fee_payer() {
        let payer = Pubkey::new_unique();
        let msg = v0::Message::try_compile(&payer, &[sample_instruction(payer)], &[], Hash::default())
            .unwrap();
        let versioned = VersionedMessage::V0(msg);
        assert_eq!(get_fee_payer(&versioned), Some(&payer));
        assert_eq!(get_message_header(&versioned).num_required_signatures, 1);
        assert_eq!(get_static_account_keys(&versioned).len(), 3);
    }
}
