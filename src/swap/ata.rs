//! Associated token accounts needed by deposit, claim and cancel calls

use crate::context::SwapContext;
use crate::errors::SwapResult;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use std::collections::HashSet;
use tracing::debug;

/// Plans token-account creation across one lifecycle call
///
/// Accounts that exist on-ledger or were already planned earlier in the
/// call are remembered, so two items sharing an owner and mint never emit
/// the same creation twice.
pub struct AtaPlanner<'a> {
    ctx: &'a SwapContext,
    payer: Pubkey,
    known: HashSet<Pubkey>,
}

impl<'a> AtaPlanner<'a> {
    pub fn new(ctx: &'a SwapContext, payer: Pubkey) -> Self {
        Self {
            ctx,
            payer,
            known: HashSet::new(),
        }
    }

    /// Address of the owner's account for `mint`, plus its creation if still needed
    pub async fn ensure(
        &mut self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> SwapResult<(Pubkey, Option<Instruction>)> {
        let ata = get_associated_token_address(owner, mint);
        if self.known.contains(&ata) {
            return Ok((ata, None));
        }
        self.known.insert(ata);

        if self.ctx.account_exists(&ata).await? {
            return Ok((ata, None));
        }
        debug!(owner = %owner, mint = %mint, ata = %ata, "Planning token account creation");
        let create =
            create_associated_token_account_idempotent(&self.payer, owner, mint, &spl_token::ID);
        Ok((ata, Some(create)))
    }

    /// Every account this planner has seen so far
    #[cfg(test)]
    pub(crate) fn known(&self) -> &HashSet<Pubkey> {
        &self.known
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_context, MockLedger};
    use solana_sdk::account::Account;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_creation_deduplicated_within_call() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let mut planner = AtaPlanner::new(&ctx, payer);
        let (first, create) = planner.ensure(&payer, &mint).await.unwrap();
        assert!(create.is_some());
        let (second, create) = planner.ensure(&payer, &mint).await.unwrap();
        assert_eq!(first, second);
        assert!(create.is_none());
        assert_eq!(planner.known().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_account_not_created() {
        let ledger = Arc::new(MockLedger::new());
        let ctx = mock_context(ledger.clone());
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        ledger.set_account(get_associated_token_address(&owner, &mint), Account::default());

        let mut planner = AtaPlanner::new(&ctx, owner);
        let (_, create) = planner.ensure(&owner, &mint).await.unwrap();
        assert!(create.is_none());
    }
}
