//! Withdrawal operations.
//!
//! A request moves money from the available balance to pending; an
//! administrator later completes it (pending leaves the wallet) or rejects
//! it (pending returns to available).

use std::collections::BTreeMap;

use bazaar_core::{AccountId, Capability, Money, WithdrawalId};
use bazaar_ledger::{WithdrawalDecision, WithdrawalMethod, WithdrawalRequest};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::marketplace::{require_admin, Marketplace};

impl Marketplace {
    // ==================== Withdrawals ====================

    /// Requests a payout from the actor's own available balance.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner` for someone else's account, `InvalidAmount` below
    /// the configured minimum or outside the platform currency, and
    /// `InsufficientBalance` when the available balance is too low.
    pub fn request_withdrawal(
        &self,
        actor: AccountId,
        account_id: AccountId,
        amount: Money,
        method: WithdrawalMethod,
        details: BTreeMap<String, String>,
    ) -> Result<WithdrawalRequest> {
        let actor = self.actor(actor)?;
        if !actor
            .capabilities(account_id, None)
            .has(Capability::Owner)
        {
            return Err(EngineError::NotOwner("withdraw from an account"));
        }
        self.ensure_platform_currency(&amount, "withdrawal")?;
        let handle = self.account_handle(account_id)?;
        let now = self.now();

        let mut account = handle.lock();
        self.refresh(&mut account, now);
        let request = account
            .request_withdrawal(
                amount,
                method,
                details,
                self.config.minimum_withdrawal(),
                now,
            )?
            .clone();
        Ok(request)
    }

    /// Marks a pending request as being paid out. Administrator only.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an administrator or the request
    /// is not pending.
    pub fn begin_withdrawal(
        &self,
        actor: AccountId,
        account_id: AccountId,
        withdrawal_id: WithdrawalId,
    ) -> Result<WithdrawalRequest> {
        let actor = self.actor(actor)?;
        require_admin(&actor, "process a withdrawal")?;
        let handle = self.account_handle(account_id)?;
        let now = self.now();

        let mut account = handle.lock();
        let request = account.begin_processing(withdrawal_id, now)?.clone();
        Ok(request)
    }

    /// Completes or rejects an open request. Administrator only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown or already resolved request.
    pub fn resolve_withdrawal(
        &self,
        actor: AccountId,
        account_id: AccountId,
        withdrawal_id: WithdrawalId,
        decision: WithdrawalDecision,
    ) -> Result<WithdrawalRequest> {
        let actor = self.actor(actor)?;
        require_admin(&actor, "resolve a withdrawal")?;
        let handle = self.account_handle(account_id)?;
        let now = self.now();

        let mut account = handle.lock();
        let request = account
            .resolve_withdrawal(withdrawal_id, decision, now)?
            .clone();
        info!(
            account_id = %account_id,
            withdrawal_id = %withdrawal_id,
            resolved_by = %actor.account_id,
            available = %account.wallet.available,
            pending = %account.wallet.pending_withdrawal,
            "withdrawal decision applied"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::error::ErrorKind;
    use crate::testkit::Harness;
    use bazaar_ledger::{WithdrawalDecision, WithdrawalMethod, WithdrawalStatus};

    #[test]
    fn completed_withdrawal_leaves_the_wallet() {
        let h = Harness::new();
        let seller = h.earning_account("seller", 200);

        let request = h
            .market
            .request_withdrawal(
                seller,
                seller,
                h.usd(100),
                WithdrawalMethod::BankTransfer,
                BTreeMap::new(),
            )
            .expect("request");
        let wallet = h.market.get_account(seller, seller).expect("account").wallet;
        assert_eq!(wallet.available, h.usd(80));
        assert_eq!(wallet.pending_withdrawal, h.usd(100));

        h.market
            .begin_withdrawal(h.admin, seller, request.id)
            .expect("processing");
        let resolved = h
            .market
            .resolve_withdrawal(
                h.admin,
                seller,
                request.id,
                WithdrawalDecision::Completed {
                    transaction_reference: "tx_1".to_string(),
                },
            )
            .expect("complete");
        assert_eq!(resolved.status, WithdrawalStatus::Completed);

        let wallet = h.market.get_account(seller, seller).expect("account").wallet;
        assert_eq!(wallet.available, h.usd(80));
        assert!(wallet.pending_withdrawal.is_zero());
        assert_eq!(wallet.lifetime_withdrawn, h.usd(100));
    }

    #[test]
    fn rejected_withdrawal_restores_balance() {
        let h = Harness::new();
        let seller = h.earning_account("seller", 200);
        let request = h
            .market
            .request_withdrawal(seller, seller, h.usd(150), WithdrawalMethod::Paypal, BTreeMap::new())
            .expect("request");

        h.market
            .resolve_withdrawal(
                h.admin,
                seller,
                request.id,
                WithdrawalDecision::Rejected {
                    reason: "details mismatch".to_string(),
                },
            )
            .expect("reject");
        let wallet = h.market.get_account(seller, seller).expect("account").wallet;
        assert_eq!(wallet.available, h.usd(180));
        assert!(wallet.pending_withdrawal.is_zero());

        let err = h
            .market
            .resolve_withdrawal(
                h.admin,
                seller,
                request.id,
                WithdrawalDecision::Completed {
                    transaction_reference: "tx_2".to_string(),
                },
            )
            .expect_err("already resolved");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn withdrawal_guards() {
        let h = Harness::new();
        let seller = h.earning_account("seller", 200);
        let other = h.account("other");

        let err = h
            .market
            .request_withdrawal(other, seller, h.usd(100), WithdrawalMethod::Paypal, BTreeMap::new())
            .expect_err("not holder");
        assert_eq!(err.kind(), ErrorKind::NotOwner);

        let err = h
            .market
            .request_withdrawal(seller, seller, h.usd(49), WithdrawalMethod::Paypal, BTreeMap::new())
            .expect_err("below minimum");
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err = h
            .market
            .request_withdrawal(seller, seller, h.usd(181), WithdrawalMethod::Paypal, BTreeMap::new())
            .expect_err("too much");
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let request = h
            .market
            .request_withdrawal(seller, seller, h.usd(50), WithdrawalMethod::Paypal, BTreeMap::new())
            .expect("request");
        let err = h
            .market
            .resolve_withdrawal(
                seller,
                seller,
                request.id,
                WithdrawalDecision::Rejected {
                    reason: "self".to_string(),
                },
            )
            .expect_err("holder cannot resolve");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
