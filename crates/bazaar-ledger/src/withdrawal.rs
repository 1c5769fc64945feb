//! Withdrawal requests and their processing.
//!
//! A request moves funds from `available` to `pending_withdrawal` when it is
//! made. An administrator later either completes it (funds leave the
//! platform) or rejects it (funds return to `available`).
//!
//! ```text
//! pending ──► processing ──► completed
//!    │             │
//!    └─────────────┴───────► rejected
//! ```

use std::collections::BTreeMap;
use std::fmt;

use bazaar_core::{Money, WithdrawalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::account::Account;
use crate::error::{LedgerError, Result};

/// Lifecycle state of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Queued, awaiting an administrator.
    Pending,
    /// Picked up by an administrator, payout in flight.
    Processing,
    /// Paid out.
    Completed,
    /// Refused; funds returned to the available balance.
    Rejected,
}

impl WithdrawalStatus {
    /// Returns true while the request's funds are held as pending.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Payout rail requested by the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethod {
    /// Bank wire / ACH / SEPA.
    BankTransfer,
    /// PayPal account.
    Paypal,
    /// Payoneer account.
    Payoneer,
    /// Any other rail, named by the requester.
    Other(String),
}

/// Administrator's resolution of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum WithdrawalDecision {
    /// Payout was sent.
    Completed {
        /// External payout reference.
        transaction_reference: String,
    },
    /// Payout was refused.
    Rejected {
        /// Reason shown to the account holder.
        reason: String,
    },
}

/// A single payout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Unique request ID.
    pub id: WithdrawalId,
    /// Amount requested.
    pub amount: Money,
    /// Payout rail.
    pub method: WithdrawalMethod,
    /// Rail-specific destination details.
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    /// Current state.
    pub status: WithdrawalStatus,
    /// When the request was made.
    pub requested_at: DateTime<Utc>,
    /// When the request reached a terminal state.
    pub processed_at: Option<DateTime<Utc>>,
    /// External payout reference, once completed.
    pub transaction_reference: Option<String>,
    /// Rejection reason, once rejected.
    pub rejection_reason: Option<String>,
}

impl Account {
    /// Queues a withdrawal, moving `amount` from available to pending.
    pub fn request_withdrawal(
        &mut self,
        amount: Money,
        method: WithdrawalMethod,
        details: BTreeMap<String, String>,
        minimum: Money,
        now: DateTime<Utc>,
    ) -> Result<&WithdrawalRequest> {
        self.ensure_currency(&amount)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if amount.currency == minimum.currency && amount.amount < minimum.amount {
            return Err(LedgerError::InvalidAmount(format!(
                "withdrawal of {amount} is below the minimum of {minimum}"
            )));
        }
        if amount.amount > self.wallet.available.amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: self.wallet.available,
            });
        }

        let available = self.wallet.available.checked_sub(amount)?;
        let pending = self.wallet.pending_withdrawal.checked_add(amount)?;

        self.wallet.available = available;
        self.wallet.pending_withdrawal = pending;
        self.withdrawals.push(WithdrawalRequest {
            id: WithdrawalId::new(),
            amount,
            method,
            details,
            status: WithdrawalStatus::Pending,
            requested_at: now,
            processed_at: None,
            transaction_reference: None,
            rejection_reason: None,
        });
        self.updated_at = now;

        let request = self.last_withdrawal()?;
        info!(
            account_id = %self.id,
            withdrawal_id = %request.id,
            amount = %amount,
            "withdrawal requested"
        );
        Ok(request)
    }

    /// Marks a pending request as being processed.
    pub fn begin_processing(
        &mut self,
        id: WithdrawalId,
        now: DateTime<Utc>,
    ) -> Result<&WithdrawalRequest> {
        let index = self.withdrawal_index(id)?;
        let status = self.withdrawals[index].status;
        if status != WithdrawalStatus::Pending {
            return Err(LedgerError::WithdrawalState { id, status });
        }
        self.withdrawals[index].status = WithdrawalStatus::Processing;
        self.updated_at = now;
        info!(account_id = %self.id, withdrawal_id = %id, "withdrawal processing");
        Ok(&self.withdrawals[index])
    }

    /// Applies an administrator's decision to an open request.
    pub fn resolve_withdrawal(
        &mut self,
        id: WithdrawalId,
        decision: WithdrawalDecision,
        now: DateTime<Utc>,
    ) -> Result<&WithdrawalRequest> {
        let index = self.withdrawal_index(id)?;
        let request = &self.withdrawals[index];
        if !request.status.is_open() {
            return Err(LedgerError::WithdrawalFinalized {
                id,
                status: request.status,
            });
        }
        let amount = request.amount;
        let pending = self.wallet.pending_withdrawal.checked_sub(amount)?;

        match decision {
            WithdrawalDecision::Completed {
                transaction_reference,
            } => {
                let withdrawn = self.wallet.lifetime_withdrawn.checked_add(amount)?;
                self.wallet.pending_withdrawal = pending;
                self.wallet.lifetime_withdrawn = withdrawn;
                let request = &mut self.withdrawals[index];
                request.status = WithdrawalStatus::Completed;
                request.transaction_reference = Some(transaction_reference);
            }
            WithdrawalDecision::Rejected { reason } => {
                let available = self.wallet.available.checked_add(amount)?;
                self.wallet.pending_withdrawal = pending;
                self.wallet.available = available;
                let request = &mut self.withdrawals[index];
                request.status = WithdrawalStatus::Rejected;
                request.rejection_reason = Some(reason);
            }
        }

        self.withdrawals[index].processed_at = Some(now);
        self.updated_at = now;
        let request = &self.withdrawals[index];
        info!(
            account_id = %self.id,
            withdrawal_id = %id,
            status = %request.status,
            amount = %amount,
            "withdrawal resolved"
        );
        Ok(request)
    }

    /// Looks up a withdrawal request by ID.
    #[must_use]
    pub fn withdrawal(&self, id: WithdrawalId) -> Option<&WithdrawalRequest> {
        self.withdrawals.iter().find(|w| w.id == id)
    }

    fn withdrawal_index(&self, id: WithdrawalId) -> Result<usize> {
        self.withdrawals
            .iter()
            .position(|w| w.id == id)
            .ok_or(LedgerError::WithdrawalNotFound(id))
    }

    fn last_withdrawal(&self) -> Result<&WithdrawalRequest> {
        self.withdrawals
            .last()
            .ok_or_else(|| LedgerError::InvalidAmount("withdrawal was not recorded".to_string()))
    }
}
