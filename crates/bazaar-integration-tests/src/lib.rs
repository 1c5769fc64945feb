//! Integration test crate for the Bazaar engine.
//!
//! This crate exists to run tests that span the core, ledger, market and
//! engine crates. The fixtures below are shared by the test modules under
//! `tests/`.

#![forbid(unsafe_code)]
#![allow(clippy::expect_used, missing_docs)]

use std::sync::Arc;

use bazaar_core::{
    AccountId, Amount, BidId, Currency, FeeRate, MilestoneId, Money, OrderId, ProjectId, ServiceId,
};
use bazaar_engine::{
    EngineConfig, ItemSelection, ManualClock, MarketEvent, Marketplace, NotificationSink,
    NotifyError, RecordedCaptures, StaticIdentityProvider,
};
use bazaar_ledger::{Account, BidAllowance, Plan, TierTerms};
use bazaar_market::{BidTerms, Budget, MilestoneDraft, Order, OrderStatus, Project, ProjectDraft, ServicePackage};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

/// Notification sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &MarketEvent) -> Result<(), NotifyError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Config whose default plan has `bids` slots per cycle at `fee_bps`.
pub fn config_with_free_tier(bids: u32, fee_bps: u32) -> EngineConfig {
    let mut config = EngineConfig::default();
    for tier in &mut config.tiers {
        if tier.plan == Plan::Free {
            *tier = TierTerms {
                plan: Plan::Free,
                fee_rate: FeeRate::from_bps(fee_bps).expect("valid fee rate"),
                bids_per_cycle: BidAllowance::Limited(bids),
                cycle_days: 30,
            };
        }
    }
    config
}

/// An awarded project and its parties.
#[derive(Debug, Clone, Copy)]
pub struct Awarded {
    pub client: AccountId,
    pub freelancer: AccountId,
    pub project: ProjectId,
    pub bid: BidId,
}

/// A marketplace wired to a manual clock, recorded captures and a
/// recording notification sink.
pub struct Fixture {
    pub market: Marketplace,
    pub clock: Arc<ManualClock>,
    pub captures: Arc<RecordedCaptures>,
    pub sink: Arc<RecordingSink>,
    pub admin: AccountId,
    capture_seq: Mutex<u32>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(mut config: EngineConfig) -> Self {
        let admin = AccountId::new();
        config.administrators.push(admin);
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        let clock = Arc::new(ManualClock::new(start));
        let captures = Arc::new(RecordedCaptures::new());
        let sink = Arc::new(RecordingSink::default());
        let market = Marketplace::builder(config.clone())
            .with_identity(Arc::new(StaticIdentityProvider::new(config.administrators)))
            .with_payments(captures.clone())
            .with_notifier(sink.clone())
            .with_clock(clock.clone())
            .build()
            .expect("valid config");
        Self {
            market,
            clock,
            captures,
            sink,
            admin,
            capture_seq: Mutex::new(0),
        }
    }

    pub fn usd(&self, major: u64) -> Money {
        Money::from_major(major, Currency::USD)
    }

    /// Records a capture of `amount` and returns its reference.
    pub fn capture(&self, amount: Money) -> String {
        let mut seq = self.capture_seq.lock();
        *seq += 1;
        let reference = format!("it_cap_{}", *seq);
        self.captures.record(reference.clone(), amount);
        reference
    }

    // ==================== Accounts ====================

    pub fn account(&self, name: &str) -> AccountId {
        self.market.open_account(name).expect("open account").id
    }

    pub fn read_account(&self, id: AccountId) -> Account {
        self.market.get_account(self.admin, id).expect("read account")
    }

    pub fn upgrade(&self, id: AccountId, plan: Plan) {
        self.market
            .change_plan(self.admin, id, plan, None)
            .expect("change plan");
    }

    /// Opens a seller and completes one service sale of `gross`.
    pub fn earning_account(&self, name: &str, gross: Money) -> AccountId {
        let seller = self.account(name);
        let buyer = self.account(&format!("{name}-buyer"));
        let service = self.service(seller, gross);
        let order = self.order_service(buyer, service);
        self.pay_and_deliver(buyer, seller, order.id);
        self.market
            .complete_order(buyer, order.id)
            .expect("complete order");
        seller
    }

    // ==================== Projects ====================

    pub fn terms(&self, amount_major: u64) -> BidTerms {
        BidTerms {
            amount: self.usd(amount_major),
            delivery_days: 14,
            proposal: "Experienced with this stack".to_string(),
        }
    }

    pub fn open_project(&self, client: AccountId) -> ProjectId {
        self.market
            .create_project(
                client,
                ProjectDraft {
                    title: "Inventory dashboard".to_string(),
                    description: "Read-only views over the warehouse API".to_string(),
                    budget: Budget {
                        min: Amount::from_major(100),
                        max: Amount::from_major(5_000),
                        currency: Currency::USD,
                    },
                    publish: true,
                },
            )
            .expect("create project")
            .id
    }

    pub fn project(&self, id: ProjectId) -> Project {
        self.market.get_project(self.admin, id).expect("get project")
    }

    pub fn bid(&self, freelancer: AccountId, project: ProjectId, amount_major: u64) -> BidId {
        self.market
            .place_bid(freelancer, project, self.terms(amount_major))
            .expect("place bid")
            .id
    }

    pub fn awarded(&self, amount_major: u64) -> Awarded {
        let client = self.account("client");
        let freelancer = self.account("freelancer");
        let project = self.open_project(client);
        let bid = self.bid(freelancer, project, amount_major);
        self.market
            .award_project(client, project, bid)
            .expect("award");
        Awarded {
            client,
            freelancer,
            project,
            bid,
        }
    }

    pub fn funded_milestone(&self, s: &Awarded, amount: Money) -> MilestoneId {
        let milestone = self
            .market
            .add_milestone(
                s.client,
                s.project,
                MilestoneDraft {
                    title: "Phase".to_string(),
                    amount,
                    due_at: None,
                },
            )
            .expect("add milestone")
            .id;
        let reference = self.capture(amount);
        self.market
            .fund_milestone(s.client, s.project, milestone, reference)
            .expect("fund milestone");
        milestone
    }

    // ==================== Orders ====================

    pub fn service(&self, seller: AccountId, price: Money) -> ServiceId {
        self.market
            .register_service(
                seller,
                "API review".to_string(),
                vec![ServicePackage {
                    name: "standard".to_string(),
                    price,
                    delivery_days: 5,
                    revisions_included: 1,
                }],
            )
            .expect("register service")
            .id
    }

    pub fn order_service(&self, buyer: AccountId, service: ServiceId) -> Order {
        self.market
            .place_order(
                buyer,
                ItemSelection::Service {
                    service_id: service,
                    package: "standard".to_string(),
                },
            )
            .expect("place order")
    }

    pub fn pay_and_deliver(&self, buyer: AccountId, seller: AccountId, order: OrderId) {
        let amount = self.market.get_order(buyer, order).expect("order").amount;
        let reference = self.capture(amount);
        self.market
            .update_order_status(buyer, order, OrderStatus::Paid, Some(reference), None)
            .expect("pay");
        self.market
            .update_order_status(seller, order, OrderStatus::InProgress, None, None)
            .expect("start");
        self.market
            .submit_delivery(seller, order, "delivered".to_string(), Vec::new())
            .expect("deliver");
    }
}
