//! The payment authority.
//!
//! Money enters the platform through an external gateway that the engine
//! never talks to directly. Before an order is marked paid or a milestone
//! funded, the engine asks the authority whether the capture named by the
//! caller really happened.

use std::collections::HashMap;

use bazaar_core::Money;
use parking_lot::RwLock;
use tracing::debug;

/// Boolean oracle over external payment captures.
pub trait PaymentAuthority: Send + Sync {
    /// Returns true if `reference` is a capture of exactly `amount`.
    fn confirm_capture(&self, reference: &str, amount: &Money) -> bool;
}

/// Authority that confirms every capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCaptured;

impl PaymentAuthority for AlwaysCaptured {
    fn confirm_capture(&self, _reference: &str, _amount: &Money) -> bool {
        true
    }
}

/// Authority backed by captures reported to it, e.g. from gateway webhooks.
#[derive(Debug, Default)]
pub struct RecordedCaptures {
    captures: RwLock<HashMap<String, Money>>,
}

impl RecordedCaptures {
    /// Creates an empty capture register.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a capture.
    pub fn record(&self, reference: impl Into<String>, amount: Money) {
        let reference = reference.into();
        debug!(%reference, %amount, "recorded payment capture");
        self.captures.write().insert(reference, amount);
    }
}

impl PaymentAuthority for RecordedCaptures {
    fn confirm_capture(&self, reference: &str, amount: &Money) -> bool {
        self.captures
            .read()
            .get(reference)
            .is_some_and(|captured| captured == amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Currency;

    #[test]
    fn recorded_capture_must_match_amount() {
        let captures = RecordedCaptures::new();
        captures.record("ch_1", Money::from_major(100, Currency::USD));

        assert!(captures.confirm_capture("ch_1", &Money::from_major(100, Currency::USD)));
        assert!(!captures.confirm_capture("ch_1", &Money::from_major(99, Currency::USD)));
        assert!(!captures.confirm_capture("ch_2", &Money::from_major(100, Currency::USD)));
    }
}
