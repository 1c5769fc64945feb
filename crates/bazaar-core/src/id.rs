//! Strongly-typed entity identifiers.
//!
//! Every persisted document is keyed by an opaque UUID. Wrapping each in its
//! own type keeps an `OrderId` from being passed where a `ProjectId` is
//! expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId(format!("{}: {e}", stringify!($name))))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a marketplace account (buyer, seller, client or freelancer).
    AccountId
);
define_id!(
    /// Identifier of a fixed-scope project.
    ProjectId
);
define_id!(
    /// Identifier of a bid on a project.
    BidId
);
define_id!(
    /// Identifier of a project milestone.
    MilestoneId
);
define_id!(
    /// Identifier of a service or product order.
    OrderId
);
define_id!(
    /// Identifier of a service listing.
    ServiceId
);
define_id!(
    /// Identifier of a product listing.
    ProductId
);
define_id!(
    /// Identifier of a withdrawal request.
    WithdrawalId
);
