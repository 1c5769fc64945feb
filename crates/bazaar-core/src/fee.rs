//! Platform fee rates and exact fee splitting.
//!
//! Rates are expressed in basis points (1/100th of a percent). Splitting an
//! amount rounds the fee half-up to the nearest minor unit and derives the
//! net share by subtraction, so `fee + net == gross` always holds exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Money};
use crate::error::{CoreError, Result};

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// A platform fee rate in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FeeRate(u32);

impl FeeRate {
    /// No fee.
    pub const ZERO: Self = Self(0);

    /// Creates a rate from basis points.
    pub const fn from_bps(bps: u32) -> Result<Self> {
        if bps > BPS_DENOMINATOR {
            return Err(CoreError::InvalidFeeRate(bps));
        }
        Ok(Self(bps))
    }

    /// Creates a rate from a whole percentage.
    pub const fn from_percent(percent: u32) -> Result<Self> {
        match percent.checked_mul(100) {
            Some(bps) => Self::from_bps(bps),
            None => Err(CoreError::InvalidFeeRate(u32::MAX)),
        }
    }

    /// Returns the rate in basis points.
    #[must_use]
    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Computes the fee on `gross`, rounded half-up to the minor unit.
    #[must_use]
    pub const fn fee_on(self, gross: Amount) -> Amount {
        let numerator = gross.as_minor() as u128 * self.0 as u128;
        let denominator = BPS_DENOMINATOR as u128;
        // rate <= 100% so the rounded fee never exceeds gross
        Amount::from_minor(((numerator + denominator / 2) / denominator) as u64)
    }

    /// Splits `gross` into the platform fee and the payee's net share.
    #[must_use]
    pub fn split(self, gross: Money) -> FeeSplit {
        let fee = self.fee_on(gross.amount);
        let net = gross.amount.checked_sub(fee).unwrap_or(Amount::ZERO);
        FeeSplit {
            gross,
            fee: Money::new(fee, gross.currency),
            net: Money::new(net, gross.currency),
        }
    }
}

impl TryFrom<u32> for FeeRate {
    type Error = CoreError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_bps(value)
    }
}

impl From<FeeRate> for u32 {
    fn from(value: FeeRate) -> Self {
        value.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// The result of applying a fee rate to a gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// The amount the fee was applied to.
    pub gross: Money,
    /// Share retained by the platform.
    pub fee: Money,
    /// Share credited to the payee.
    pub net: Money,
}
