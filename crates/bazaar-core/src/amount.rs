//! Monetary amounts with fixed-point precision.
//!
//! [`Amount`] stores a non-negative quantity in minor currency units (cents)
//! so that no arithmetic ever touches floating point. [`Money`] pairs an
//! amount with its [`Currency`]; arithmetic across currencies is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Number of decimal places carried by every amount.
pub const MINOR_DIGITS: u32 = 2;

/// Minor units in one major unit.
pub const MINOR_PER_MAJOR: u64 = 100;

/// A non-negative monetary amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant.
    pub const ZERO: Self = Self(0);

    /// Maximum representable amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units.
    ///
    /// Saturates at [`Amount::MAX`].
    #[must_use]
    pub const fn from_major(major: u64) -> Self {
        Self(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Returns the amount in minor units.
    #[must_use]
    pub const fn as_minor(self) -> u64 {
        self.0
    }

    /// Returns the whole major units (truncates the fractional part).
    #[must_use]
    pub const fn as_major(self) -> u64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked multiplication by a quantity. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, rhs: u64) -> Option<Self> {
        match self.0.checked_mul(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MINOR_PER_MAJOR;
        let frac = self.0 % MINOR_PER_MAJOR;
        write!(f, "{whole}.{frac:02}")
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(CoreError::InvalidAmount("negative values not allowed".into()));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(CoreError::InvalidAmount(format!("invalid number: {s}")));
        }
        if frac_str.len() > MINOR_DIGITS as usize {
            return Err(CoreError::InvalidAmount(format!(
                "too many decimal places: {s}"
            )));
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CoreError::InvalidAmount(format!("invalid number: {s}")));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| CoreError::InvalidAmount(format!("invalid whole part: {s}")))?
        };

        let padded = format!("{frac_str:0<2}");
        let frac: u64 = padded
            .parse()
            .map_err(|_| CoreError::InvalidAmount(format!("invalid fractional part: {s}")))?;

        whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|minor| minor.checked_add(frac))
            .map(Self)
            .ok_or_else(|| CoreError::InvalidAmount("overflow".into()))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An ISO-4217 alphabetic currency code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// US dollar.
    pub const USD: Self = Self(*b"USD");

    /// Euro.
    pub const EUR: Self = Self(*b"EUR");

    /// Parses a three-letter code, normalising to upper case.
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(CoreError::InvalidCurrency(code.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Currency {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// An amount tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// The fixed-point amount.
    pub amount: Amount,
    /// The currency the amount is denominated in.
    pub currency: Currency,
}

impl Money {
    /// Creates a new money value.
    #[must_use]
    pub const fn new(amount: Amount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Amount::ZERO, currency)
    }

    /// Creates money from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64, currency: Currency) -> Self {
        Self::new(Amount::from_minor(minor), currency)
    }

    /// Creates money from whole major units.
    #[must_use]
    pub const fn from_major(major: u64, currency: Currency) -> Self {
        Self::new(Amount::from_major(major), currency)
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Fails unless both values share a currency.
    pub fn ensure_same_currency(&self, other: &Self) -> Result<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(CoreError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            })
        }
    }

    /// Adds two values of the same currency.
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.ensure_same_currency(&rhs)?;
        self.amount
            .checked_add(rhs.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| CoreError::InvalidAmount(format!("overflow adding {rhs} to {self}")))
    }

    /// Subtracts `rhs`, failing on underflow or currency mismatch.
    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        self.ensure_same_currency(&rhs)?;
        self.amount
            .checked_sub(rhs.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| {
                CoreError::InvalidAmount(format!("cannot subtract {rhs} from {self}"))
            })
    }

    /// Multiplies by a quantity.
    pub fn checked_mul(self, quantity: u64) -> Result<Self> {
        self.amount
            .checked_mul(quantity)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| CoreError::InvalidAmount(format!("overflow multiplying {self}")))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
