//! Error types for bazaar-engine.

use std::fmt;

use bazaar_core::{AccountId, CoreError};
use bazaar_ledger::LedgerError;
use bazaar_market::MarketError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure category returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Referenced entity does not exist.
    NotFound,
    /// Operation is reserved to the entity's owner.
    NotOwner,
    /// Actor lacks the required capability.
    Forbidden,
    /// Entity is not in a state that permits the request.
    InvalidState,
    /// Requested status change is not in the legal-transition table.
    IllegalTransition,
    /// Bidder already bid on the project.
    DuplicateBid,
    /// Client bid on their own project.
    SelfBidding,
    /// Bid does not belong to the project.
    InvalidBid,
    /// No bid slots left in the current cycle.
    QuotaExhausted,
    /// Amount is malformed, zero, below minimum or in the wrong currency.
    InvalidAmount,
    /// Amount exceeds the available balance.
    InsufficientBalance,
    /// Product stock is too low.
    InsufficientStock,
    /// Operator-side failure; details are logged, not returned.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The acting account is unknown to the identity provider, or is a
    /// member without an account.
    #[error("unknown actor: {0}")]
    UnknownActor(AccountId),

    /// Operation reserved to the entity's owner.
    #[error("only the owner may {0}")]
    NotOwner(&'static str),

    /// Operation reserved to an administrator.
    #[error("administrator role required to {0}")]
    AdministratorRequired(&'static str),

    /// The payment authority did not confirm the capture.
    #[error("payment {reference} has not been captured")]
    PaymentNotCaptured {
        /// Reference supplied by the caller.
        reference: String,
    },

    /// Request cannot be served in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Amount in the wrong currency or otherwise unacceptable.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// State machine error.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// Ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Monetary arithmetic error.
    #[error(transparent)]
    Money(#[from] CoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot read or write failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the caller-facing category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnknownActor(_) | Self::AdministratorRequired(_) => ErrorKind::Forbidden,
            Self::NotOwner(_) => ErrorKind::NotOwner,
            Self::PaymentNotCaptured { .. } | Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidAmount(_) | Self::Money(_) => ErrorKind::InvalidAmount,
            Self::Market(e) => market_kind(e),
            Self::Ledger(e) => ledger_kind(e),
            Self::Config(_) | Self::Snapshot(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

fn market_kind(e: &MarketError) -> ErrorKind {
    match e {
        MarketError::NotFound(_) => ErrorKind::NotFound,
        MarketError::NotOwner { .. } => ErrorKind::NotOwner,
        MarketError::Forbidden { .. } => ErrorKind::Forbidden,
        MarketError::InvalidState(_) => ErrorKind::InvalidState,
        MarketError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
        MarketError::DuplicateBid { .. } => ErrorKind::DuplicateBid,
        MarketError::SelfBidding(_) => ErrorKind::SelfBidding,
        MarketError::InvalidBid(_) => ErrorKind::InvalidBid,
        MarketError::InvalidAmount(_) | MarketError::Money(_) => ErrorKind::InvalidAmount,
        MarketError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
    }
}

fn ledger_kind(e: &LedgerError) -> ErrorKind {
    match e {
        LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
        LedgerError::InvalidAmount(_) | LedgerError::Money(_) => ErrorKind::InvalidAmount,
        LedgerError::QuotaExhausted { .. } => ErrorKind::QuotaExhausted,
        // a resolved request is no longer addressable for resolution
        LedgerError::WithdrawalNotFound(_) | LedgerError::WithdrawalFinalized { .. } => {
            ErrorKind::NotFound
        }
        LedgerError::WithdrawalState { .. } => ErrorKind::InvalidState,
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
