//! Error types for the bazaar-ledger crate.

use bazaar_core::{CoreError, Money, WithdrawalId};
use thiserror::Error;

use crate::membership::Plan;
use crate::withdrawal::WithdrawalStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Requested amount exceeds the available balance.
    #[error("insufficient balance: requested {required}, available {available}")]
    InsufficientBalance {
        /// Amount requested.
        required: Money,
        /// Amount currently available.
        available: Money,
    },

    /// Amount is zero, below a minimum, or otherwise unacceptable.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// No bid slots remain in the current cycle.
    #[error("bid quota exhausted for {plan} plan")]
    QuotaExhausted {
        /// The plan whose allowance is used up.
        plan: Plan,
    },

    /// Withdrawal request does not exist on this account.
    #[error("withdrawal request not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    /// Withdrawal request exists but was already resolved.
    #[error("withdrawal request {id} is already {status}")]
    WithdrawalFinalized {
        /// The request.
        id: WithdrawalId,
        /// Its terminal status.
        status: WithdrawalStatus,
    },

    /// Withdrawal request is not in a state that permits the operation.
    #[error("withdrawal request {id} is {status}")]
    WithdrawalState {
        /// The request.
        id: WithdrawalId,
        /// Its current status.
        status: WithdrawalStatus,
    },

    /// Underlying monetary arithmetic failed.
    #[error(transparent)]
    Money(#[from] CoreError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
