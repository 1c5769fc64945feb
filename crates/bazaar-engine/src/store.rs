//! In-memory document store.
//!
//! Every document lives behind its own mutex. The registry lock is only held
//! long enough to clone the handle, so operations on unrelated documents
//! never contend.
//!
//! Lock order when more than one document is needed:
//! project or order, then catalog item, then account.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use bazaar_core::{AccountId, BidId, OrderId, ProductId, ProjectId, ServiceId};
use bazaar_ledger::Account;
use bazaar_market::{Order, Product, ProjectRecord, Service};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// A document that can be locked independently.
pub(crate) type Shared<T> = Arc<Mutex<T>>;

/// ID-keyed collection of lockable documents.
#[derive(Debug)]
pub(crate) struct Registry<K, V> {
    items: RwLock<HashMap<K, Shared<V>>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Copy + Eq + Hash + Ord,
    V: Clone,
{
    pub(crate) fn get(&self, id: &K) -> Option<Shared<V>> {
        self.items.read().get(id).cloned()
    }

    pub(crate) fn insert(&self, id: K, value: V) {
        self.items.write().insert(id, Arc::new(Mutex::new(value)));
    }

    pub(crate) fn remove(&self, id: &K) -> Option<Shared<V>> {
        self.items.write().remove(id)
    }

    pub(crate) fn contains(&self, id: &K) -> bool {
        self.items.read().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Copies of every document, in ID order.
    ///
    /// Each document is locked in turn, so the result is consistent per
    /// document but not across documents.
    pub(crate) fn snapshot(&self) -> Vec<V> {
        let mut handles: Vec<(K, Shared<V>)> = self
            .items
            .read()
            .iter()
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles.into_iter().map(|(_, v)| v.lock().clone()).collect()
    }
}

/// Serializable copy of every document in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    /// Accounts with wallets, memberships and withdrawal history.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Projects with their bids.
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    /// Orders.
    #[serde(default)]
    pub orders: Vec<Order>,
    /// Service listings.
    #[serde(default)]
    pub services: Vec<Service>,
    /// Product listings.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// All marketplace documents.
#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) accounts: Registry<AccountId, Account>,
    pub(crate) projects: Registry<ProjectId, ProjectRecord>,
    pub(crate) orders: Registry<OrderId, Order>,
    pub(crate) services: Registry<ServiceId, Service>,
    pub(crate) products: Registry<ProductId, Product>,
    /// Index: bid ID -> project ID.
    bid_index: RwLock<HashMap<BidId, ProjectId>>,
}

impl Store {
    pub(crate) fn from_state(state: MarketState) -> Self {
        let store = Self::default();
        for account in state.accounts {
            store.accounts.insert(account.id, account);
        }
        for record in state.projects {
            store.index_bids(&record);
            store.projects.insert(record.project.id, record);
        }
        for order in state.orders {
            store.orders.insert(order.id, order);
        }
        for service in state.services {
            store.services.insert(service.id, service);
        }
        for product in state.products {
            store.products.insert(product.id, product);
        }
        store
    }

    pub(crate) fn to_state(&self) -> MarketState {
        MarketState {
            accounts: self.accounts.snapshot(),
            projects: self.projects.snapshot(),
            orders: self.orders.snapshot(),
            services: self.services.snapshot(),
            products: self.products.snapshot(),
        }
    }

    fn index_bids(&self, record: &ProjectRecord) {
        let mut index = self.bid_index.write();
        for bid in record.bids.iter() {
            index.insert(bid.id, record.project.id);
        }
    }

    pub(crate) fn index_bid(&self, bid: BidId, project: ProjectId) {
        self.bid_index.write().insert(bid, project);
    }

    pub(crate) fn project_of_bid(&self, bid: &BidId) -> Option<ProjectId> {
        self.bid_index.read().get(bid).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Amount, Currency};
    use bazaar_ledger::{BidAllowance, Plan, TierTerms};
    use bazaar_market::{Budget, Project, ProjectDraft};
    use chrono::Utc;

    fn terms() -> TierTerms {
        TierTerms {
            plan: Plan::Free,
            fee_rate: bazaar_core::FeeRate::ZERO,
            bids_per_cycle: BidAllowance::Limited(10),
            cycle_days: 30,
        }
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let registry: Registry<AccountId, Account> = Registry::default();
        for name in ["a", "b", "c"] {
            let account = Account::new(name, Currency::USD, &terms(), Utc::now());
            registry.insert(account.id, account);
        }
        let ids: Vec<AccountId> = registry.snapshot().iter().map(|a| a.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn state_round_trips_through_store() {
        let now = Utc::now();
        let client = Account::new("client", Currency::USD, &terms(), now);
        let project = Project::new(
            client.id,
            ProjectDraft {
                title: "Logo".to_string(),
                description: String::new(),
                budget: Budget {
                    min: Amount::from_major(100),
                    max: Amount::from_major(500),
                    currency: Currency::USD,
                },
                publish: true,
            },
            now,
        )
        .expect("valid project");

        let state = MarketState {
            accounts: vec![client],
            projects: vec![ProjectRecord::new(project)],
            ..MarketState::default()
        };
        let store = Store::from_state(state.clone());
        assert_eq!(store.to_state(), state);
    }

    #[test]
    fn removed_documents_are_gone() {
        let registry: Registry<AccountId, Account> = Registry::default();
        let account = Account::new("a", Currency::USD, &terms(), Utc::now());
        let id = account.id;
        registry.insert(id, account);
        assert!(registry.remove(&id).is_some());
        assert!(!registry.contains(&id));
        assert!(registry.get(&id).is_none());
    }
}
