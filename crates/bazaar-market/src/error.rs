//! Error types for bazaar-market.

use bazaar_core::{AccountId, Capability, CapabilitySet, CoreError, ProductId, ProjectId};
use thiserror::Error;

/// Errors that can occur in marketplace state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation is reserved to the entity's owner.
    #[error("only the owner may {action}")]
    NotOwner {
        /// What was attempted.
        action: &'static str,
    },

    /// Actor holds none of the capabilities the operation requires.
    #[error("not permitted to {action}")]
    Forbidden {
        /// What was attempted.
        action: &'static str,
    },

    /// Entity is not in a state that permits the request.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Requested status change is not in the legal-transition table.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// The bidder already has a bid on this project.
    #[error("account {bidder} already bid on project {project}")]
    DuplicateBid {
        /// The project.
        project: ProjectId,
        /// The bidder.
        bidder: AccountId,
    },

    /// A client tried to bid on their own project.
    #[error("cannot bid on own project {0}")]
    SelfBidding(ProjectId),

    /// Bid does not belong to the project or cannot be awarded.
    #[error("invalid bid: {0}")]
    InvalidBid(String),

    /// Amount is zero, in the wrong currency, or otherwise unacceptable.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Product has fewer units in stock than requested.
    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The product.
        product: ProductId,
        /// Units requested.
        requested: u32,
        /// Units in stock.
        available: u32,
    },

    /// Underlying monetary arithmetic failed.
    #[error(transparent)]
    Money(#[from] CoreError),
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Fails unless `caps` holds one of `required`.
///
/// An owner-only requirement surfaces as [`MarketError::NotOwner`], anything
/// else as [`MarketError::Forbidden`].
pub(crate) fn require(
    caps: CapabilitySet,
    required: &[Capability],
    action: &'static str,
) -> Result<()> {
    if caps.has_any(required) {
        Ok(())
    } else if required == [Capability::Owner] {
        Err(MarketError::NotOwner { action })
    } else {
        Err(MarketError::Forbidden { action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Actor;

    #[test]
    fn owner_only_requirement_reports_not_owner() {
        let caps = Actor::member(AccountId::new()).capabilities(AccountId::new(), None);
        assert_eq!(
            require(caps, &[Capability::Owner], "release a milestone"),
            Err(MarketError::NotOwner {
                action: "release a milestone"
            })
        );
    }

    #[test]
    fn mixed_requirement_reports_forbidden() {
        let caps = Actor::member(AccountId::new()).capabilities(AccountId::new(), None);
        assert!(matches!(
            require(caps, &[Capability::Owner, Capability::Administrator], "cancel"),
            Err(MarketError::Forbidden { .. })
        ));
    }

    #[test]
    fn illegal_transition_display() {
        let err = MarketError::IllegalTransition {
            from: "pending".to_string(),
            to: "completed".to_string(),
        };
        assert_eq!(err.to_string(), "illegal transition: pending -> completed");
    }
}
