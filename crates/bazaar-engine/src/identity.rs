//! Identity and time collaborators.
//!
//! Authentication happens outside the engine. An [`IdentityProvider`] only
//! reports the role of an already-authenticated account.

use std::collections::HashSet;

use bazaar_core::{AccountId, Role};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Resolves the platform role of an acting account.
pub trait IdentityProvider: Send + Sync {
    /// Returns the account's role, or `None` if the account is unknown.
    fn role_of(&self, account: &AccountId) -> Option<Role>;
}

/// Identity provider backed by a fixed administrator list.
///
/// Every other account is treated as a member.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    administrators: HashSet<AccountId>,
}

impl StaticIdentityProvider {
    /// Creates a provider with the given administrators.
    #[must_use]
    pub fn new(administrators: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            administrators: administrators.into_iter().collect(),
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn role_of(&self, account: &AccountId) -> Option<Role> {
        if self.administrators.contains(account) {
            Some(Role::Administrator)
        } else {
            Some(Role::Member)
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Sets the clock.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_distinguishes_administrators() {
        let admin = AccountId::new();
        let provider = StaticIdentityProvider::new([admin]);
        assert_eq!(provider.role_of(&admin), Some(Role::Administrator));
        assert_eq!(provider.role_of(&AccountId::new()), Some(Role::Member));
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(31));
        assert_eq!(clock.now(), start + Duration::days(31));
    }
}
