//! # bazaar-core
//!
//! Primitives shared by every part of the Bazaar marketplace engine.
//!
//! This crate provides:
//!
//! - [`Amount`]: Fixed-point monetary amount in minor currency units
//! - [`Currency`] / [`Money`]: ISO-4217 code and an amount tagged with it
//! - [`FeeRate`]: Platform fee in basis points with exact splitting
//! - Typed identifiers ([`AccountId`], [`ProjectId`], [`OrderId`], ...)
//! - [`CapabilitySet`]: Authorization resolved once per operation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod capability;
pub mod error;
pub mod fee;
pub mod id;

pub use amount::{Amount, Currency, Money};
pub use capability::{Actor, Capability, CapabilitySet, Role};
pub use error::{CoreError, Result};
pub use fee::{FeeRate, FeeSplit};
pub use id::{
    AccountId, BidId, MilestoneId, OrderId, ProductId, ProjectId, ServiceId, WithdrawalId,
};
