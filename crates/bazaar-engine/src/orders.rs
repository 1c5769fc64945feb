//! Catalog and order operations.
//!
//! Orders lock in the order: order, then catalog item, then seller account.

use bazaar_core::{AccountId, Actor, Capability, FeeRate, Money, OrderId, ProductId, ServiceId};
use bazaar_market::{MarketError, Order, OrderItem, OrderStatus, Product, Service, ServicePackage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::marketplace::Marketplace;
use crate::notify::MarketEvent;

/// What a buyer picks at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemSelection {
    /// One package of a service.
    Service {
        /// The service.
        service_id: ServiceId,
        /// Package name.
        package: String,
    },
    /// Units of a product.
    Product {
        /// The product.
        product_id: ProductId,
        /// Units to buy.
        quantity: u32,
    },
}

impl Marketplace {
    // ==================== Catalog ====================

    /// Lists a service. The actor becomes its seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has no account or a package is invalid
    /// or not priced in the platform currency.
    pub fn register_service(
        &self,
        actor: AccountId,
        title: String,
        packages: Vec<ServicePackage>,
    ) -> Result<Service> {
        let actor = self.seller(actor)?;
        for package in &packages {
            self.ensure_platform_currency(&package.price, "package price")?;
        }

        let service = Service::new(actor.account_id, title, packages, self.now())?;
        self.store.services.insert(service.id, service.clone());

        info!(
            service_id = %service.id,
            seller_id = %service.seller_id,
            packages = service.packages.len(),
            "registered service"
        );
        Ok(service)
    }

    /// Lists a product with initial stock. The actor becomes its seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has no account or the price is invalid.
    pub fn register_product(
        &self,
        actor: AccountId,
        title: String,
        price: Money,
        stock: u32,
    ) -> Result<Product> {
        let actor = self.seller(actor)?;
        self.ensure_platform_currency(&price, "product price")?;

        let product = Product::new(actor.account_id, title, price, stock, self.now())?;
        self.store.products.insert(product.id, product.clone());

        info!(
            product_id = %product.id,
            seller_id = %product.seller_id,
            stock,
            "registered product"
        );
        Ok(product)
    }

    /// Adds stock to a product. Seller only.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or belongs to someone else.
    pub fn restock_product(
        &self,
        actor: AccountId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product> {
        let actor = self.actor(actor)?;
        let handle = self.product_handle(product_id)?;

        let mut product = handle.lock();
        let caps = actor.capabilities(product.seller_id, None);
        let stock = product.restock(caps, quantity)?;

        info!(product_id = %product_id, added = quantity, stock, "restocked product");
        Ok(product.clone())
    }

    /// Reads a service listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the service does not exist.
    pub fn get_service(&self, service_id: ServiceId) -> Result<Service> {
        Ok(self.service_handle(service_id)?.lock().clone())
    }

    /// Reads a product listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist.
    pub fn get_product(&self, product_id: ProductId) -> Result<Product> {
        Ok(self.product_handle(product_id)?.lock().clone())
    }

    fn seller(&self, actor: AccountId) -> Result<Actor> {
        let actor = self.actor(actor)?;
        if self.store.accounts.contains(&actor.account_id) {
            Ok(actor)
        } else {
            Err(EngineError::not_found("account", actor.account_id))
        }
    }

    // ==================== Orders ====================

    /// Places an order for a service package or product units.
    ///
    /// The seller's current fee rate is frozen into the order. Product stock
    /// is reserved immediately and returned if the order is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown listing or package, `Forbidden` when
    /// buying one's own listing and `InsufficientStock` when stock is short.
    pub fn place_order(&self, actor: AccountId, selection: ItemSelection) -> Result<Order> {
        let actor = self.actor(actor)?;
        if !self.store.accounts.contains(&actor.account_id) {
            return Err(EngineError::not_found("account", actor.account_id));
        }
        let now = self.now();

        let order = match selection {
            ItemSelection::Service {
                service_id,
                package,
            } => {
                let handle = self.service_handle(service_id)?;
                let service = handle.lock();
                let item = OrderItem::Service {
                    service_id,
                    package: service.package(&package)?.clone(),
                };
                let fee_rate = self.seller_fee_rate(service.seller_id, now)?;
                Order::new(actor.account_id, service.seller_id, item, fee_rate, now)?
            }
            ItemSelection::Product {
                product_id,
                quantity,
            } => {
                let handle = self.product_handle(product_id)?;
                let mut product = handle.lock();
                let item = OrderItem::Product {
                    product_id,
                    unit_price: product.price,
                    quantity,
                };
                let fee_rate = self.seller_fee_rate(product.seller_id, now)?;
                let order = Order::new(actor.account_id, product.seller_id, item, fee_rate, now)?;
                product.reserve(quantity)?;
                order
            }
        };
        self.store.orders.insert(order.id, order.clone());

        info!(
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            seller_id = %order.seller_id,
            amount = %order.amount,
            platform_fee = %order.platform_fee,
            "placed order"
        );
        Ok(order)
    }

    fn seller_fee_rate(&self, seller: AccountId, now: DateTime<Utc>) -> Result<FeeRate> {
        let handle = self.account_handle(seller)?;
        let mut account = handle.lock();
        self.refresh(&mut account, now);
        Ok(account.membership.fee_rate)
    }

    /// Reads an order. Buyer, seller or administrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the actor is not a party.
    pub fn get_order(&self, actor: AccountId, order_id: OrderId) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let order = handle.lock();
        let caps = order.capabilities(&actor);
        if !caps.has_any(&[
            Capability::Owner,
            Capability::Counterparty,
            Capability::Administrator,
        ]) {
            return Err(EngineError::Market(MarketError::Forbidden {
                action: "read an order",
            }));
        }
        Ok(order.clone())
    }

    /// Moves an order along the status table.
    ///
    /// Legality is checked before anything else. `paid` needs a payment
    /// reference the payment authority confirms for the order amount;
    /// `completed` and `cancelled` run the same paths as
    /// [`Marketplace::complete_order`] and [`Marketplace::cancel_order`].
    /// Delivery and revision have their own operations because they carry
    /// content.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTransition` when the table forbids the move.
    pub fn update_order_status(
        &self,
        actor: AccountId,
        order_id: OrderId,
        target: OrderStatus,
        payment_reference: Option<String>,
        reason: Option<String>,
    ) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let now = self.now();

        let mut order = handle.lock();
        order.ensure_transition(target)?;
        let caps = order.capabilities(&actor);

        match target {
            OrderStatus::Paid => {
                let reference = payment_reference
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        EngineError::InvalidState("a payment reference is required".to_string())
                    })?;
                let amount = order.ensure_payable(caps)?;
                if !self.payments.confirm_capture(&reference, &amount) {
                    return Err(EngineError::PaymentNotCaptured { reference });
                }
                order.mark_paid(caps, reference, now)?;
            }
            OrderStatus::InProgress => order.start(caps, now)?,
            OrderStatus::Completed => {
                let (completed, event) = self.settle_locked(&mut order, &actor, now)?;
                drop(order);
                self.emit(&event);
                return Ok(completed);
            }
            OrderStatus::Cancelled => {
                let cancelled =
                    self.cancel_locked(&mut order, &actor, reason.unwrap_or_default(), now)?;
                return Ok(cancelled);
            }
            OrderStatus::Pending | OrderStatus::Delivered | OrderStatus::Revision => {
                return Err(EngineError::InvalidState(format!(
                    "order {order_id} cannot be moved to {target} through a status update"
                )));
            }
        }

        info!(order_id = %order_id, status = %order.status, "updated order status");
        Ok(order.clone())
    }

    /// Seller hands over the work.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the seller or the order is not
    /// in progress or under revision.
    pub fn submit_delivery(
        &self,
        actor: AccountId,
        order_id: OrderId,
        message: String,
        attachments: Vec<String>,
    ) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let now = self.now();

        let mut order = handle.lock();
        let caps = order.capabilities(&actor);
        order.submit_delivery(caps, message, attachments, now)?;
        let delivered = order.clone();
        drop(order);

        info!(order_id = %order_id, "order delivered");
        self.emit(&MarketEvent::OrderDelivered {
            order_id,
            buyer_id: delivered.buyer_id,
        });
        Ok(delivered)
    }

    /// Buyer asks for changes to a delivered order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the order is delivered and, for service
    /// orders, an included revision remains.
    pub fn request_revision(
        &self,
        actor: AccountId,
        order_id: OrderId,
        message: String,
    ) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let now = self.now();

        let mut order = handle.lock();
        let caps = order.capabilities(&actor);
        order.request_revision(caps, message, now)?;

        info!(
            order_id = %order_id,
            revisions = order.revision_count,
            "order revision requested"
        );
        Ok(order.clone())
    }

    /// Buyer accepts a delivered order; the seller is credited.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the buyer or the order is not delivered.
    pub fn complete_order(&self, actor: AccountId, order_id: OrderId) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let now = self.now();

        let mut order = handle.lock();
        let (completed, event) = self.settle_locked(&mut order, &actor, now)?;
        drop(order);
        self.emit(&event);
        Ok(completed)
    }

    /// Calls off a pending or paid order and returns reserved stock.
    ///
    /// Buyer, seller or administrator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once work has started.
    pub fn cancel_order(&self, actor: AccountId, order_id: OrderId, reason: String) -> Result<Order> {
        let actor = self.actor(actor)?;
        let handle = self.order_handle(order_id)?;
        let now = self.now();

        let mut order = handle.lock();
        self.cancel_locked(&mut order, &actor, reason, now)
    }

    /// Completes a locked order: seller credit, listing counters, then status.
    ///
    /// Returns the event to emit once the order lock is released.
    fn settle_locked(
        &self,
        order: &mut Order,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(Order, MarketEvent)> {
        let caps = order.capabilities(actor);
        let settlement = order.plan_completion(caps)?;

        let service = settlement
            .service_id
            .map(|id| self.service_handle(id))
            .transpose()?;
        let product = settlement
            .product_sale
            .map(|(id, _)| self.product_handle(id))
            .transpose()?;
        let seller = self.account_handle(settlement.seller_id)?;

        let mut service = service.as_ref().map(|h| h.lock());
        let mut product = product.as_ref().map(|h| h.lock());
        let mut account = seller.lock();
        account.credit_earnings(settlement.seller_earning, now)?;
        drop(account);

        if let Some(service) = service.as_mut() {
            service.record_completion();
        }
        if let (Some(product), Some((_, quantity))) = (product.as_mut(), settlement.product_sale) {
            product.record_sale(quantity);
        }
        order.apply_completion(now);
        drop(service);
        drop(product);
        let completed = order.clone();

        info!(
            order_id = %completed.id,
            seller_id = %settlement.seller_id,
            seller_earning = %settlement.seller_earning,
            platform_fee = %completed.platform_fee,
            "completed order"
        );
        let event = MarketEvent::OrderCompleted {
            order_id: completed.id,
            seller_id: settlement.seller_id,
            seller_earning: settlement.seller_earning,
        };
        Ok((completed, event))
    }

    /// Cancels a locked order and puts reserved stock back.
    fn cancel_locked(
        &self,
        order: &mut Order,
        actor: &Actor,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let product = order
            .item
            .reserved_stock()
            .map(|(id, _)| self.product_handle(id))
            .transpose()?;
        let caps = order.capabilities(actor);
        let restock = order.cancel(caps, actor.account_id, reason, now)?;

        if let (Some(handle), Some((product_id, quantity))) = (product, restock) {
            let mut product = handle.lock();
            product.release(quantity);
            info!(product_id = %product_id, returned = quantity, stock = product.stock, "returned stock");
        }

        info!(order_id = %order.id, cancelled_by = %actor.account_id, "cancelled order");
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::ItemSelection;
    use crate::config::EngineConfig;
    use crate::error::ErrorKind;
    use crate::marketplace::Marketplace;
    use crate::payment::PaymentAuthority;
    use crate::notify::MarketEvent;
    use crate::testkit::Harness;
    use bazaar_core::{Currency, Money};
    use bazaar_market::{OrderStatus, ServicePackage};
    use test_case::test_case;

    #[test]
    fn product_order_reserves_and_cancel_returns_stock() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let product = h.product(seller, 20, 5);

        let order = h
            .market
            .place_order(
                buyer,
                ItemSelection::Product {
                    product_id: product,
                    quantity: 3,
                },
            )
            .expect("order");
        assert_eq!(order.amount, h.usd(60));
        assert_eq!(h.stock(seller, product), 2);

        let err = h
            .market
            .place_order(
                buyer,
                ItemSelection::Product {
                    product_id: product,
                    quantity: 3,
                },
            )
            .expect_err("short");
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(h.stock(seller, product), 2);

        let cancelled = h
            .market
            .cancel_order(buyer, order.id, "changed my mind".to_string())
            .expect("cancel");
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(h.stock(seller, product), 5);
    }

    #[test]
    fn buying_own_listing_is_forbidden() {
        let h = Harness::new();
        let seller = h.account("seller");
        let product = h.product(seller, 20, 5);
        let err = h
            .market
            .place_order(
                seller,
                ItemSelection::Product {
                    product_id: product,
                    quantity: 1,
                },
            )
            .expect_err("self purchase");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(h.stock(seller, product), 5);
    }

    #[test]
    fn service_order_lifecycle_credits_seller() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 1);

        let order = h.service_order(buyer, service);
        assert_eq!(order.platform_fee, h.usd(10));
        assert_eq!(order.seller_earning, h.usd(90));

        h.captures.record("ch_1", h.usd(100));
        h.market
            .update_order_status(buyer, order.id, OrderStatus::Paid, Some("ch_1".to_string()), None)
            .expect("paid");
        h.market
            .update_order_status(seller, order.id, OrderStatus::InProgress, None, None)
            .expect("started");
        h.market
            .submit_delivery(seller, order.id, "done".to_string(), vec!["logo.svg".to_string()])
            .expect("delivered");
        h.market
            .request_revision(buyer, order.id, "bigger".to_string())
            .expect("revision");
        h.market
            .submit_delivery(seller, order.id, "bigger now".to_string(), Vec::new())
            .expect("redelivered");

        let err = h
            .market
            .request_revision(buyer, order.id, "again".to_string())
            .expect_err("revisions used up");
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let completed = h.market.complete_order(buyer, order.id).expect("complete");
        assert_eq!(completed.status, OrderStatus::Completed);

        let account = h.market.get_account(seller, seller).expect("seller");
        assert_eq!(account.wallet.available, h.usd(90));
        let events = h.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, MarketEvent::OrderDelivered { buyer_id, .. } if *buyer_id == buyer)));
        assert!(events
            .iter()
            .any(|e| matches!(e, MarketEvent::OrderCompleted { seller_id, .. } if *seller_id == seller)));
    }

    #[test]
    fn fee_is_frozen_at_checkout() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);

        h.market
            .change_plan(h.admin, seller, bazaar_ledger::Plan::Enterprise, None)
            .expect("upgrade");
        h.deliver(buyer, seller, order.id);
        h.market.complete_order(buyer, order.id).expect("complete");

        let account = h.market.get_account(seller, seller).expect("seller");
        assert_eq!(account.wallet.available, h.usd(90));
    }

    #[test]
    fn paid_needs_a_confirmed_capture() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);

        let err = h
            .market
            .update_order_status(buyer, order.id, OrderStatus::Paid, None, None)
            .expect_err("no reference");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = h
            .market
            .update_order_status(buyer, order.id, OrderStatus::Paid, Some("unknown".to_string()), None)
            .expect_err("not captured");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            h.market.get_order(buyer, order.id).expect("order").status,
            OrderStatus::Pending
        );
    }

    #[derive(Debug, Default)]
    struct CountingAuthority {
        calls: AtomicUsize,
    }

    impl PaymentAuthority for CountingAuthority {
        fn confirm_capture(&self, _reference: &str, _amount: &Money) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn stranger_cannot_pay_and_never_reaches_the_authority() {
        let authority = Arc::new(CountingAuthority::default());
        let market = Marketplace::builder(EngineConfig::default())
            .with_payments(authority.clone())
            .build()
            .expect("market");
        let seller = market.open_account("seller").expect("seller").id;
        let buyer = market.open_account("buyer").expect("buyer").id;
        let stranger = market.open_account("stranger").expect("stranger").id;
        let service = market
            .register_service(
                seller,
                "Logo".to_string(),
                vec![ServicePackage {
                    name: "basic".to_string(),
                    price: Money::from_major(100, Currency::USD),
                    delivery_days: 3,
                    revisions_included: 0,
                }],
            )
            .expect("service")
            .id;
        let order = market
            .place_order(
                buyer,
                ItemSelection::Service {
                    service_id: service,
                    package: "basic".to_string(),
                },
            )
            .expect("order");

        let err = market
            .update_order_status(stranger, order.id, OrderStatus::Paid, Some("ch_1".to_string()), None)
            .expect_err("stranger");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(authority.calls.load(Ordering::SeqCst), 0);

        market
            .update_order_status(buyer, order.id, OrderStatus::Paid, Some("ch_1".to_string()), None)
            .expect("buyer pays");
        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
    }

    #[test_case(OrderStatus::Completed ; "pending to completed")]
    #[test_case(OrderStatus::Delivered ; "pending to delivered")]
    #[test_case(OrderStatus::InProgress ; "pending to in progress")]
    fn illegal_transitions_from_pending(target: OrderStatus) {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);

        let err = h
            .market
            .update_order_status(seller, order.id, target, None, None)
            .expect_err("illegal");
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn delivered_cannot_be_set_through_status_route() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);
        h.pay(buyer, order.id, 100);
        h.market
            .update_order_status(seller, order.id, OrderStatus::InProgress, None, None)
            .expect("start");

        let err = h
            .market
            .update_order_status(seller, order.id, OrderStatus::Delivered, None, None)
            .expect_err("needs content");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn started_orders_cannot_be_cancelled() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);
        h.pay(buyer, order.id, 100);
        h.market
            .update_order_status(seller, order.id, OrderStatus::InProgress, None, None)
            .expect("start");

        let err = h
            .market
            .update_order_status(buyer, order.id, OrderStatus::Cancelled, None, Some("late".to_string()))
            .expect_err("in progress");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn strangers_cannot_read_orders() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let stranger = h.account("stranger");
        let service = h.service(seller, 100, 0);
        let order = h.service_order(buyer, service);

        assert!(h.market.get_order(seller, order.id).is_ok());
        assert!(h.market.get_order(h.admin, order.id).is_ok());
        let err = h.market.get_order(stranger, order.id).expect_err("stranger");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn restock_is_seller_only() {
        let h = Harness::new();
        let seller = h.account("seller");
        let other = h.account("other");
        let product = h.product(seller, 20, 1);

        let err = h
            .market
            .restock_product(other, product, 10)
            .expect_err("not seller");
        assert_eq!(err.kind(), ErrorKind::NotOwner);
        let restocked = h.market.restock_product(seller, product, 10).expect("restock");
        assert_eq!(restocked.stock, 11);
    }

    #[test]
    fn unknown_package_is_not_found() {
        let h = Harness::new();
        let seller = h.account("seller");
        let buyer = h.account("buyer");
        let service = h.service(seller, 100, 0);
        let err = h
            .market
            .place_order(
                buyer,
                ItemSelection::Service {
                    service_id: service,
                    package: "platinum".to_string(),
                },
            )
            .expect_err("no such package");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
