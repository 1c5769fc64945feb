//! Capability-based authorization.
//!
//! Each state-machine operation states the capability it needs. The acting
//! account's capabilities relative to one entity are resolved once, up
//! front, from the actor's role and the entity's owner / counterparty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::AccountId;

/// Platform-wide role of an acting account, as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary marketplace participant.
    #[default]
    Member,
    /// Platform operator allowed to resolve withdrawals and disputes.
    Administrator,
}

/// The authenticated account performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The acting account.
    pub account_id: AccountId,
    /// The actor's platform role.
    pub role: Role,
}

impl Actor {
    /// Creates a member actor.
    #[must_use]
    pub const fn member(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::Member,
        }
    }

    /// Creates an administrator actor.
    #[must_use]
    pub const fn administrator(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::Administrator,
        }
    }

    /// Resolves this actor's capabilities against an entity.
    #[must_use]
    pub fn capabilities(
        &self,
        owner: AccountId,
        counterparty: Option<AccountId>,
    ) -> CapabilitySet {
        CapabilitySet::resolve(self, owner, counterparty)
    }
}

/// A single capability an actor may hold over an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The entity's owner (project client, order buyer, bid author, account holder).
    Owner,
    /// The other party (assigned freelancer, order seller).
    Counterparty,
    /// Platform administrator.
    Administrator,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Self::Owner => 0b001,
            Self::Counterparty => 0b010,
            Self::Administrator => 0b100,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Counterparty => "counterparty",
            Self::Administrator => "administrator",
        };
        f.write_str(s)
    }
}

/// The set of capabilities an actor holds over one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Resolves the capabilities of `actor` for an entity owned by `owner`.
    #[must_use]
    pub fn resolve(actor: &Actor, owner: AccountId, counterparty: Option<AccountId>) -> Self {
        let mut set = Self::NONE;
        if actor.account_id == owner {
            set = set.with(Capability::Owner);
        }
        if counterparty == Some(actor.account_id) {
            set = set.with(Capability::Counterparty);
        }
        if actor.role == Role::Administrator {
            set = set.with(Capability::Administrator);
        }
        set
    }

    /// Returns a copy of the set with `capability` added.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Returns true if the set holds `capability`.
    #[must_use]
    pub const fn has(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Returns true if the set holds any of `capabilities`.
    #[must_use]
    pub fn has_any(self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|c| self.has(*c))
    }

    /// Returns true if no capability is held.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_resolves_owner_only() {
        let owner = AccountId::new();
        let caps = Actor::member(owner).capabilities(owner, Some(AccountId::new()));
        assert!(caps.has(Capability::Owner));
        assert!(!caps.has(Capability::Counterparty));
        assert!(!caps.has(Capability::Administrator));
    }

    #[test]
    fn counterparty_resolves() {
        let seller = AccountId::new();
        let caps = Actor::member(seller).capabilities(AccountId::new(), Some(seller));
        assert!(caps.has(Capability::Counterparty));
        assert!(!caps.has(Capability::Owner));
    }

    #[test]
    fn administrator_is_independent_of_ownership() {
        let caps = Actor::administrator(AccountId::new()).capabilities(AccountId::new(), None);
        assert!(caps.has(Capability::Administrator));
        assert!(caps.has_any(&[Capability::Owner, Capability::Administrator]));
        assert!(!caps.has_any(&[Capability::Owner, Capability::Counterparty]));
    }

    #[test]
    fn stranger_has_nothing() {
        let caps = Actor::member(AccountId::new()).capabilities(AccountId::new(), None);
        assert!(caps.is_empty());
    }
}
