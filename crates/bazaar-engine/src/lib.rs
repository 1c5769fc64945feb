//! Bazaar transaction and ledger engine.
//!
//! This crate wires the pure state machines of `bazaar-market` and the
//! account ledger of `bazaar-ledger` into a concurrent [`Marketplace`]:
//!
//! - **Locking**: one mutex per document; multi-document operations lock in
//!   a fixed order (project or order, then catalog item, then account)
//! - **Collaborators**: identity, payment confirmation, notifications and
//!   time are injected through traits
//! - **Dispatch**: every operation is reachable as a tagged [`Request`] with
//!   optional idempotency keys
//! - **Persistence**: the whole state round-trips through [`JsonSnapshot`]
//!
//! # Example
//!
//! ```rust
//! use bazaar_engine::{EngineConfig, Marketplace};
//!
//! let market = Marketplace::new(EngineConfig::default()).unwrap();
//! let account = market.open_account("Ada").unwrap();
//! assert!(account.wallet.available.is_zero());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod accounts;
pub mod api;
mod bids;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod identity;
mod marketplace;
pub mod notify;
mod orders;
pub mod payment;
mod projects;
pub mod snapshot;
mod store;
mod withdrawals;

#[cfg(test)]
mod testkit;

pub use api::{ApiError, ApiResponse, Request};
pub use config::{EngineConfig, IdempotencyConfig};
pub use error::{EngineError, ErrorKind, Result};
pub use idempotency::{Admission, Fingerprint, IdempotencyCache};
pub use identity::{Clock, IdentityProvider, ManualClock, StaticIdentityProvider, SystemClock};
pub use marketplace::{Marketplace, MarketplaceBuilder};
pub use notify::{MarketEvent, NoopNotificationSink, NotificationSink, NotifyError, TracingNotificationSink};
pub use orders::ItemSelection;
pub use payment::{AlwaysCaptured, PaymentAuthority, RecordedCaptures};
pub use snapshot::JsonSnapshot;
pub use store::MarketState;
