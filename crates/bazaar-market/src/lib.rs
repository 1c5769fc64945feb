//! # bazaar-market
//!
//! Marketplace state machines, free of storage and locking concerns.
//!
//! - [`BidBook`] / [`Bid`]: bids on a project, unique per bidder
//! - [`ProjectRecord`]: a project with its bids; award and cancellation
//! - [`Project`] / [`Milestone`]: milestone escrow funding and release
//! - [`Order`]: service and product order fulfillment
//! - [`Service`] / [`Product`]: the catalog fields orders depend on
//!
//! Every operation takes the acting account's [`bazaar_core::CapabilitySet`]
//! and states which capability it requires.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod award;
pub mod bid;
pub mod catalog;
pub mod error;
pub mod milestone;
pub mod order;
pub mod project;

pub use award::{AwardOutcome, ProjectRecord};
pub use bid::{Bid, BidBook, BidStatus, BidTerms};
pub use catalog::{Product, Service, ServicePackage};
pub use error::{MarketError, Result};
pub use milestone::{Milestone, MilestoneDraft, MilestoneStatus};
pub use order::{Cancellation, Delivery, Order, OrderItem, OrderStatus, RevisionRequest, Settlement};
pub use project::{AgreedTerms, Budget, Dispute, Project, ProjectDraft, ProjectStatus, ReleasePlan};
