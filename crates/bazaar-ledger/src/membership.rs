//! Membership tiers and the bid quota tracker.
//!
//! A membership determines two things: the platform fee rate applied to the
//! member's earnings, and how many bids the member may place per cycle.
//! Recharge and plan expiry are evaluated lazily whenever the account is
//! touched; there is no timer.

use std::fmt;

use bazaar_core::FeeRate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, Result};

/// Membership plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Default tier every account starts on.
    #[default]
    Free,
    /// Entry paid tier.
    Starter,
    /// Paid tier for regular sellers.
    Professional,
    /// Top tier, typically with an unlimited bid allowance.
    Enterprise,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        };
        write!(f, "{s}")
    }
}

/// A per-cycle bid allowance.
///
/// Serialized as an integer where `-1` means unlimited, matching the
/// document layout used for account records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum BidAllowance {
    /// A finite number of bids.
    Limited(u32),
    /// No limit.
    Unlimited,
}

impl BidAllowance {
    /// Serialized sentinel for [`BidAllowance::Unlimited`].
    pub const UNLIMITED_SENTINEL: i64 = -1;

    /// Returns true if at least one bid may be placed.
    #[must_use]
    pub const fn has_slot(self) -> bool {
        match self {
            Self::Limited(n) => n > 0,
            Self::Unlimited => true,
        }
    }

    /// Returns the allowance after one bid is placed, or `None` if exhausted.
    #[must_use]
    pub const fn consume(self) -> Option<Self> {
        match self {
            Self::Limited(0) => None,
            Self::Limited(n) => Some(Self::Limited(n - 1)),
            Self::Unlimited => Some(Self::Unlimited),
        }
    }
}

impl TryFrom<i64> for BidAllowance {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        if value == Self::UNLIMITED_SENTINEL {
            return Ok(Self::Unlimited);
        }
        u32::try_from(value)
            .map(Self::Limited)
            .map_err(|_| format!("invalid bid allowance: {value}"))
    }
}

impl From<BidAllowance> for i64 {
    fn from(value: BidAllowance) -> Self {
        match value {
            BidAllowance::Limited(n) => Self::from(n),
            BidAllowance::Unlimited => BidAllowance::UNLIMITED_SENTINEL,
        }
    }
}

impl fmt::Display for BidAllowance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// The commercial terms of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTerms {
    /// The plan these terms apply to.
    pub plan: Plan,
    /// Fee retained by the platform on the member's earnings.
    pub fee_rate: FeeRate,
    /// Bids granted at each recharge.
    pub bids_per_cycle: BidAllowance,
    /// Length of one recharge cycle in days.
    pub cycle_days: u32,
}

impl TierTerms {
    /// Returns the recharge cycle as a duration.
    #[must_use]
    pub fn cycle(&self) -> Duration {
        Duration::days(i64::from(self.cycle_days.max(1)))
    }
}

/// What a lazy refresh changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MembershipRefresh {
    /// The paid plan lapsed and the default tier was applied.
    pub expired: bool,
    /// The bid allowance was recharged.
    pub recharged: bool,
}

/// An account's current membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Current plan.
    pub plan: Plan,
    /// Fee rate charged on the member's earnings.
    pub fee_rate: FeeRate,
    /// Bids left in the current cycle.
    pub bids_remaining: BidAllowance,
    /// Bids granted at each recharge.
    pub bids_per_cycle: BidAllowance,
    /// Recharge cycle length in days.
    pub cycle_days: u32,
    /// When the paid plan lapses; `None` for plans that never expire.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the allowance is next reset.
    pub next_recharge_at: DateTime<Utc>,
}

impl Membership {
    /// Starts a membership on `terms` at `now`.
    #[must_use]
    pub fn new(terms: &TierTerms, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            plan: terms.plan,
            fee_rate: terms.fee_rate,
            bids_remaining: terms.bids_per_cycle,
            bids_per_cycle: terms.bids_per_cycle,
            cycle_days: terms.cycle_days,
            expires_at,
            next_recharge_at: now + terms.cycle(),
        }
    }

    /// Reserves one bid slot, decrementing the remaining allowance.
    pub fn check_and_reserve_bid_slot(&mut self) -> Result<BidAllowance> {
        let remaining = self
            .bids_remaining
            .consume()
            .ok_or(LedgerError::QuotaExhausted { plan: self.plan })?;
        self.bids_remaining = remaining;
        Ok(remaining)
    }

    /// Resets the allowance if the recharge date has been reached.
    ///
    /// The allowance is reset once no matter how many cycles were skipped;
    /// the recharge date moves to the first cycle boundary after `now`.
    pub fn recharge_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_recharge_at {
            return false;
        }
        self.bids_remaining = self.bids_per_cycle;
        let cycle = Duration::days(i64::from(self.cycle_days.max(1)));
        while self.next_recharge_at <= now {
            self.next_recharge_at += cycle;
        }
        debug!(
            plan = %self.plan,
            bids = %self.bids_remaining,
            next_recharge_at = %self.next_recharge_at,
            "recharged bid allowance"
        );
        true
    }

    /// Falls back to `default_terms` once a paid plan has lapsed.
    pub fn expire_if_lapsed(&mut self, now: DateTime<Utc>, default_terms: &TierTerms) -> bool {
        match self.expires_at {
            Some(expires_at) if now >= expires_at => {
                debug!(plan = %self.plan, %expires_at, "membership lapsed");
                *self = Self::new(default_terms, now, None);
                true
            }
            _ => false,
        }
    }

    /// Applies expiry and recharge in that order.
    pub fn refresh(&mut self, now: DateTime<Utc>, default_terms: &TierTerms) -> MembershipRefresh {
        let expired = self.expire_if_lapsed(now, default_terms);
        let recharged = self.recharge_if_due(now);
        MembershipRefresh { expired, recharged }
    }

    /// Switches to a new plan, resetting the allowance and cycle.
    pub fn change_plan(
        &mut self,
        terms: &TierTerms,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        *self = Self::new(terms, now, expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn terms(plan: Plan, bids: BidAllowance) -> TierTerms {
        TierTerms {
            plan,
            fee_rate: FeeRate::from_percent(10).unwrap_or(FeeRate::ZERO),
            bids_per_cycle: bids,
            cycle_days: 30,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default()
    }

    #[test]
    fn reserve_decrements_until_exhausted() {
        let mut m = Membership::new(&terms(Plan::Free, BidAllowance::Limited(1)), now(), None);
        assert_eq!(m.check_and_reserve_bid_slot(), Ok(BidAllowance::Limited(0)));
        assert_eq!(
            m.check_and_reserve_bid_slot(),
            Err(LedgerError::QuotaExhausted { plan: Plan::Free })
        );
        assert_eq!(m.bids_remaining, BidAllowance::Limited(0));
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut m = Membership::new(&terms(Plan::Enterprise, BidAllowance::Unlimited), now(), None);
        for _ in 0..1_000 {
            assert!(m.check_and_reserve_bid_slot().is_ok());
        }
        assert_eq!(m.bids_remaining, BidAllowance::Unlimited);
    }

    #[test]
    fn recharge_waits_for_due_date() {
        let start = now();
        let mut m = Membership::new(&terms(Plan::Free, BidAllowance::Limited(5)), start, None);
        m.bids_remaining = BidAllowance::Limited(0);

        assert!(!m.recharge_if_due(start + Duration::days(29)));
        assert_eq!(m.bids_remaining, BidAllowance::Limited(0));

        assert!(m.recharge_if_due(start + Duration::days(30)));
        assert_eq!(m.bids_remaining, BidAllowance::Limited(5));
        assert_eq!(m.next_recharge_at, start + Duration::days(60));
    }

    #[test]
    fn dormant_account_recharges_once() {
        let start = now();
        let mut m = Membership::new(&terms(Plan::Free, BidAllowance::Limited(1)), start, None);
        assert!(m.check_and_reserve_bid_slot().is_ok());

        let later = start + Duration::days(95);
        let mut placed = 0;
        for _ in 0..10 {
            m.recharge_if_due(later);
            if m.check_and_reserve_bid_slot().is_ok() {
                placed += 1;
            }
        }

        assert_eq!(placed, 1);
        assert_eq!(m.next_recharge_at, start + Duration::days(120));
        assert!(!m.recharge_if_due(later));
    }

    #[test]
    fn lapsed_plan_falls_back_to_default() {
        let start = now();
        let free = terms(Plan::Free, BidAllowance::Limited(10));
        let pro = TierTerms {
            plan: Plan::Professional,
            fee_rate: FeeRate::from_percent(5).unwrap_or(FeeRate::ZERO),
            bids_per_cycle: BidAllowance::Limited(100),
            cycle_days: 30,
        };
        let mut m = Membership::new(&pro, start, Some(start + Duration::days(30)));

        let outcome = m.refresh(start + Duration::days(31), &free);
        assert!(outcome.expired);
        assert_eq!(m.plan, Plan::Free);
        assert_eq!(m.bids_remaining, BidAllowance::Limited(10));
        assert_eq!(m.expires_at, None);
    }

    #[test]
    fn change_plan_resets_allowance() {
        let start = now();
        let mut m = Membership::new(&terms(Plan::Free, BidAllowance::Limited(2)), start, None);
        m.bids_remaining = BidAllowance::Limited(0);
        m.change_plan(&terms(Plan::Starter, BidAllowance::Limited(30)), start, None);
        assert_eq!(m.plan, Plan::Starter);
        assert_eq!(m.bids_remaining, BidAllowance::Limited(30));
    }

    #[test_case(-1, Some(BidAllowance::Unlimited) ; "sentinel")]
    #[test_case(0, Some(BidAllowance::Limited(0)) ; "zero")]
    #[test_case(25, Some(BidAllowance::Limited(25)) ; "positive")]
    #[test_case(-2, None ; "other negative")]
    fn allowance_from_integer(raw: i64, expected: Option<BidAllowance>) {
        assert_eq!(BidAllowance::try_from(raw).ok(), expected);
    }

    #[test]
    fn allowance_serializes_sentinel() {
        let json = serde_json::to_string(&BidAllowance::Unlimited).expect("serialize");
        assert_eq!(json, "-1");
    }
}
