//! Accounts and their wallets.

use bazaar_core::{AccountId, Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::membership::{BidAllowance, Membership, MembershipRefresh, TierTerms};
use crate::withdrawal::WithdrawalRequest;

/// The monetary fields of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Funds that may be withdrawn.
    pub available: Money,
    /// Funds locked in open withdrawal requests.
    pub pending_withdrawal: Money,
    /// Total ever paid out.
    pub lifetime_withdrawn: Money,
    /// Total ever credited from milestones and orders.
    pub lifetime_earned: Money,
}

impl Wallet {
    /// Creates an empty wallet in `currency`.
    #[must_use]
    pub const fn new(currency: Currency) -> Self {
        Self {
            available: Money::zero(currency),
            pending_withdrawal: Money::zero(currency),
            lifetime_withdrawn: Money::zero(currency),
            lifetime_earned: Money::zero(currency),
        }
    }

    /// The wallet's currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.available.currency
    }
}

/// A marketplace account: identity, wallet, membership and payout history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Human-readable name.
    pub display_name: String,
    /// Monetary balances.
    pub wallet: Wallet,
    /// Plan, fee tier and bid quota.
    pub membership: Membership,
    /// Withdrawal requests in the order they were made.
    pub withdrawals: Vec<WithdrawalRequest>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Opens an account with an empty wallet.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        currency: Currency,
        terms: &TierTerms,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            display_name: display_name.into(),
            wallet: Wallet::new(currency),
            membership: Membership::new(terms, now, None),
            withdrawals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies lazy plan expiry and quota recharge.
    pub fn refresh_membership(
        &mut self,
        now: DateTime<Utc>,
        default_terms: &TierTerms,
    ) -> MembershipRefresh {
        let outcome = self.membership.refresh(now, default_terms);
        if outcome.expired || outcome.recharged {
            self.updated_at = now;
        }
        outcome
    }

    /// Reserves one bid slot from the membership quota.
    pub fn reserve_bid_slot(&mut self, now: DateTime<Utc>) -> Result<BidAllowance> {
        let remaining = self.membership.check_and_reserve_bid_slot()?;
        self.updated_at = now;
        debug!(account_id = %self.id, remaining = %remaining, "reserved bid slot");
        Ok(remaining)
    }

    /// Credits realized earnings to the available balance.
    pub fn credit_earnings(&mut self, amount: Money, now: DateTime<Utc>) -> Result<()> {
        let available = self.wallet.available.checked_add(amount)?;
        let earned = self.wallet.lifetime_earned.checked_add(amount)?;
        self.wallet.available = available;
        self.wallet.lifetime_earned = earned;
        self.updated_at = now;
        info!(account_id = %self.id, amount = %amount, balance = %available, "credited earnings");
        Ok(())
    }

    /// Sum of all pending and processing withdrawal requests.
    pub fn open_withdrawal_total(&self) -> Result<Money> {
        self.withdrawals
            .iter()
            .filter(|w| w.status.is_open())
            .try_fold(Money::zero(self.wallet.currency()), |acc, w| {
                acc.checked_add(w.amount)
            })
            .map_err(LedgerError::from)
    }

    /// Returns true if the pending total matches the open requests.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.open_withdrawal_total()
            .is_ok_and(|total| total == self.wallet.pending_withdrawal)
    }

    pub(crate) fn ensure_currency(&self, amount: &Money) -> Result<()> {
        if amount.currency == self.wallet.currency() {
            Ok(())
        } else {
            Err(LedgerError::InvalidAmount(format!(
                "account {} holds {}, got {}",
                self.id,
                self.wallet.currency(),
                amount.currency
            )))
        }
    }
}
