//! # bazaar-ledger
//!
//! The monetary side of a marketplace account.
//!
//! - [`Account`]: identity plus [`Wallet`] (available balance, pending
//!   withdrawals, lifetime withdrawn) and its withdrawal history
//! - [`Membership`]: plan tier, fee rate and the per-cycle bid quota
//! - [`WithdrawalRequest`]: payout requests resolved by an administrator
//!
//! Every mutating method validates all of its preconditions before touching
//! any field, so a returned error always leaves the account unchanged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod error;
mod membership;
mod withdrawal;

pub use account::{Account, Wallet};
pub use error::{LedgerError, Result};
pub use membership::{BidAllowance, Membership, MembershipRefresh, Plan, TierTerms};
pub use withdrawal::{WithdrawalDecision, WithdrawalMethod, WithdrawalRequest, WithdrawalStatus};
