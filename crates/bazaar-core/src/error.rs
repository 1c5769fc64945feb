//! Error types for bazaar-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core monetary operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Invalid amount (malformed, negative, or overflowing).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid ISO-4217 currency code.
    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Arithmetic between two different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: String,
        /// Currency of the right operand.
        right: String,
    },

    /// Fee rate outside of 0..=100%.
    #[error("invalid fee rate: {0} basis points")]
    InvalidFeeRate(u32),

    /// Identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
