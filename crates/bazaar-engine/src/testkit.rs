//! Shared fixtures for unit tests.

use std::sync::Arc;

use bazaar_core::{AccountId, BidId, Currency, MilestoneId, Money, OrderId, ProductId, ProjectId, ServiceId};
use bazaar_market::{BidTerms, Budget, MilestoneDraft, Order, OrderStatus, Project, ProjectDraft, ServicePackage};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::identity::{ManualClock, StaticIdentityProvider};
use crate::marketplace::Marketplace;
use crate::notify::{MarketEvent, NotificationSink, NotifyError};
use crate::orders::ItemSelection;
use crate::payment::RecordedCaptures;

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<MarketEvent>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &MarketEvent) -> Result<(), NotifyError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// An awarded project and its parties.
pub(crate) struct Awarded {
    pub client: AccountId,
    pub freelancer: AccountId,
    pub project: ProjectId,
    pub bid: BidId,
}

pub(crate) struct Harness {
    pub market: Marketplace,
    pub clock: Arc<ManualClock>,
    pub captures: Arc<RecordedCaptures>,
    pub admin: AccountId,
    sink: Arc<RecordingSink>,
    capture_seq: Mutex<u32>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

impl Harness {
    pub fn new() -> Self {
        let admin = AccountId::new();
        let clock = Arc::new(ManualClock::new(start()));
        let captures = Arc::new(RecordedCaptures::new());
        let sink = Arc::new(RecordingSink::default());
        let market = Marketplace::builder(EngineConfig::default())
            .with_identity(Arc::new(StaticIdentityProvider::new([admin])))
            .with_payments(captures.clone())
            .with_notifier(sink.clone())
            .with_clock(clock.clone())
            .build()
            .expect("default config is valid");
        Self {
            market,
            clock,
            captures,
            admin,
            sink,
            capture_seq: Mutex::new(0),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.market.now()
    }

    pub fn usd(&self, major: u64) -> Money {
        Money::from_major(major, Currency::USD)
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.sink.events.lock().clone()
    }

    fn next_capture(&self, amount: Money) -> String {
        let mut seq = self.capture_seq.lock();
        *seq += 1;
        let reference = format!("cap_{}", *seq);
        self.captures.record(reference.clone(), amount);
        reference
    }

    // ==================== Accounts ====================

    pub fn account(&self, name: &str) -> AccountId {
        self.market.open_account(name).expect("open account").id
    }

    /// An account holding the net of one completed `gross_major` sale.
    pub fn earning_account(&self, name: &str, gross_major: u64) -> AccountId {
        let seller = self.account(name);
        let buyer = self.account(&format!("{name}-buyer"));
        let service = self.service(seller, gross_major, 0);
        let order = self.service_order(buyer, service);
        self.deliver(buyer, seller, order.id);
        self.market
            .complete_order(buyer, order.id)
            .expect("complete order");
        seller
    }

    // ==================== Projects ====================

    pub fn terms(&self, amount_major: u64, days: u32) -> BidTerms {
        BidTerms {
            amount: self.usd(amount_major),
            delivery_days: days,
            proposal: "I can do this".to_string(),
        }
    }

    fn project_draft(min: u64, max: u64, publish: bool) -> ProjectDraft {
        ProjectDraft {
            title: "Landing page".to_string(),
            description: "Responsive, three sections".to_string(),
            budget: Budget {
                min: bazaar_core::Amount::from_major(min),
                max: bazaar_core::Amount::from_major(max),
                currency: Currency::USD,
            },
            publish,
        }
    }

    pub fn open_project(&self, client: AccountId, min: u64, max: u64) -> ProjectId {
        self.market
            .create_project(client, Self::project_draft(min, max, true))
            .expect("create project")
            .id
    }

    pub fn draft_project(&self, client: AccountId, min: u64, max: u64) -> ProjectId {
        self.market
            .create_project(client, Self::project_draft(min, max, false))
            .expect("create draft")
            .id
    }

    pub fn project(&self, actor: AccountId, project: ProjectId) -> Project {
        self.market.get_project(actor, project).expect("get project")
    }

    pub fn bid(&self, freelancer: AccountId, project: ProjectId, amount_major: u64) -> BidId {
        self.market
            .place_bid(freelancer, project, self.terms(amount_major, 10))
            .expect("place bid")
            .id
    }

    pub fn awarded(&self, amount_major: u64) -> Awarded {
        let client = self.account("client");
        let freelancer = self.account("freelancer");
        let project = self.open_project(client, amount_major / 2, amount_major * 2);
        let bid = self.bid(freelancer, project, amount_major);
        self.market
            .award_project(client, project, bid)
            .expect("award project");
        Awarded {
            client,
            freelancer,
            project,
            bid,
        }
    }

    pub fn milestone(&self, s: &Awarded, amount_major: u64) -> MilestoneId {
        self.market
            .add_milestone(
                s.client,
                s.project,
                MilestoneDraft {
                    title: format!("Milestone worth {amount_major}"),
                    amount: self.usd(amount_major),
                    due_at: None,
                },
            )
            .expect("add milestone")
            .id
    }

    pub fn funded_milestone(&self, s: &Awarded, amount_major: u64) -> MilestoneId {
        let milestone = self.milestone(s, amount_major);
        let reference = self.next_capture(self.usd(amount_major));
        self.market
            .fund_milestone(s.client, s.project, milestone, reference)
            .expect("fund milestone");
        milestone
    }

    // ==================== Catalog and Orders ====================

    pub fn product(&self, seller: AccountId, price_major: u64, stock: u32) -> ProductId {
        self.market
            .register_product(seller, "Icon pack".to_string(), self.usd(price_major), stock)
            .expect("register product")
            .id
    }

    pub fn stock(&self, _actor: AccountId, product: ProductId) -> u32 {
        self.market.get_product(product).expect("get product").stock
    }

    pub fn service(&self, seller: AccountId, price_major: u64, revisions: u32) -> ServiceId {
        self.market
            .register_service(
                seller,
                "Logo design".to_string(),
                vec![ServicePackage {
                    name: "basic".to_string(),
                    price: self.usd(price_major),
                    delivery_days: 3,
                    revisions_included: revisions,
                }],
            )
            .expect("register service")
            .id
    }

    pub fn service_order(&self, buyer: AccountId, service: ServiceId) -> Order {
        self.market
            .place_order(
                buyer,
                ItemSelection::Service {
                    service_id: service,
                    package: "basic".to_string(),
                },
            )
            .expect("place order")
    }

    pub fn pay(&self, buyer: AccountId, order: OrderId, amount_major: u64) {
        let reference = self.next_capture(self.usd(amount_major));
        self.market
            .update_order_status(buyer, order, OrderStatus::Paid, Some(reference), None)
            .expect("pay order");
    }

    /// Pays, starts and delivers an order.
    pub fn deliver(&self, buyer: AccountId, seller: AccountId, order: OrderId) {
        let amount = self.market.get_order(buyer, order).expect("get order").amount;
        let reference = self.next_capture(amount);
        self.market
            .update_order_status(buyer, order, OrderStatus::Paid, Some(reference), None)
            .expect("pay order");
        self.market
            .update_order_status(seller, order, OrderStatus::InProgress, None, None)
            .expect("start order");
        self.market
            .submit_delivery(seller, order, "here you go".to_string(), Vec::new())
            .expect("deliver order");
    }
}
