//! Service and product orders.
//!
//! The platform fee is fixed when the order is placed, using the seller's
//! fee rate at that moment, and never recomputed. Completion only realizes
//! the already-quoted `seller_earning`.

use std::fmt;

use bazaar_core::{
    AccountId, Actor, Capability, CapabilitySet, FeeRate, Money, OrderId, ProductId, ServiceId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ServicePackage;
use crate::error::{require, MarketError, Result};

/// The state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    Pending,
    /// Payment captured.
    Paid,
    /// Seller working on it.
    InProgress,
    /// Seller handed over the work.
    Delivered,
    /// Buyer asked for changes.
    Revision,
    /// Buyer accepted; earnings realized.
    Completed,
    /// Called off before work started.
    Cancelled,
}

impl OrderStatus {
    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        use OrderStatus::{Cancelled, Completed, Delivered, InProgress, Paid, Pending, Revision};

        matches!(
            (self, target),
            (Pending, Paid | Cancelled)
                | (Paid, InProgress | Cancelled)
                | (InProgress, Delivered | Cancelled)
                | (Delivered, Completed | Revision)
                | (Revision, Delivered)
        )
    }

    /// Returns true once no further status change is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::InProgress => "in_progress",
            Self::Delivered => "delivered",
            Self::Revision => "revision",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What was bought. Exactly one of a service package or a product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderItem {
    /// A service package, snapshotted at checkout.
    Service {
        /// The service ordered.
        service_id: ServiceId,
        /// Package terms at checkout.
        package: ServicePackage,
    },
    /// Units of a product.
    Product {
        /// The product ordered.
        product_id: ProductId,
        /// Unit price at checkout.
        unit_price: Money,
        /// Units ordered.
        quantity: u32,
    },
}

impl OrderItem {
    /// Total price of the item.
    pub fn total(&self) -> Result<Money> {
        match self {
            Self::Service { package, .. } => Ok(package.price),
            Self::Product {
                unit_price,
                quantity,
                ..
            } => Ok(unit_price.checked_mul(u64::from(*quantity))?),
        }
    }

    /// Revision rounds included, or `None` when unlimited.
    #[must_use]
    pub const fn revisions_included(&self) -> Option<u32> {
        match self {
            Self::Service { package, .. } => Some(package.revisions_included),
            Self::Product { .. } => None,
        }
    }

    /// Stock to return if the order is cancelled.
    #[must_use]
    pub const fn reserved_stock(&self) -> Option<(ProductId, u32)> {
        match self {
            Self::Service { .. } => None,
            Self::Product {
                product_id,
                quantity,
                ..
            } => Some((*product_id, *quantity)),
        }
    }
}

/// The seller's hand-over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Note to the buyer.
    pub message: String,
    /// Links to delivered files.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// When it was handed over.
    pub delivered_at: DateTime<Utc>,
}

/// A buyer's request for changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRequest {
    /// What should change.
    pub message: String,
    /// When it was asked.
    pub requested_at: DateTime<Utc>,
}

/// Who called the order off, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Acting account.
    pub cancelled_by: AccountId,
    /// Stated reason.
    pub reason: String,
    /// When it happened.
    pub cancelled_at: DateTime<Utc>,
}

/// Effects of completing an order outside the order itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Payee.
    pub seller_id: AccountId,
    /// Amount to credit, as quoted at checkout.
    pub seller_earning: Money,
    /// Service whose completed-order counter increments.
    pub service_id: Option<ServiceId>,
    /// Product and units to add to its sales counter.
    pub product_sale: Option<(ProductId, u32)>,
}

/// A buyer's purchase from a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Purchasing account; owns the order.
    pub buyer_id: AccountId,
    /// Selling account.
    pub seller_id: AccountId,
    /// What was bought.
    pub item: OrderItem,
    /// Total charged to the buyer.
    pub amount: Money,
    /// Seller's fee rate at checkout.
    pub platform_fee_rate: FeeRate,
    /// Share retained by the platform.
    pub platform_fee: Money,
    /// Share owed to the seller.
    pub seller_earning: Money,
    /// Current state.
    pub status: OrderStatus,
    /// Payment capture reference.
    pub payment_reference: Option<String>,
    /// Latest delivery.
    pub delivery: Option<Delivery>,
    /// Revision requests in order.
    pub revisions: Vec<RevisionRequest>,
    /// Number of revision requests.
    pub revision_count: u32,
    /// Set when cancelled.
    pub cancellation: Option<Cancellation>,
    /// Checkout time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// When payment was confirmed.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the buyer accepted.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Places an order, freezing the fee split at `fee_rate`.
    pub fn new(
        buyer_id: AccountId,
        seller_id: AccountId,
        item: OrderItem,
        fee_rate: FeeRate,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if buyer_id == seller_id {
            return Err(MarketError::Forbidden {
                action: "buy your own listing",
            });
        }
        let amount = item.total()?;
        if amount.is_zero() {
            return Err(MarketError::InvalidAmount(
                "order amount must be positive".to_string(),
            ));
        }
        let split = fee_rate.split(amount);
        Ok(Self {
            id: OrderId::new(),
            buyer_id,
            seller_id,
            item,
            amount,
            platform_fee_rate: fee_rate,
            platform_fee: split.fee,
            seller_earning: split.net,
            status: OrderStatus::Pending,
            payment_reference: None,
            delivery: None,
            revisions: Vec::new(),
            revision_count: 0,
            cancellation: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            completed_at: None,
        })
    }

    /// Capabilities of `actor` over this order.
    #[must_use]
    pub fn capabilities(&self, actor: &Actor) -> CapabilitySet {
        actor.capabilities(self.buyer_id, Some(self.seller_id))
    }

    /// Fails with [`MarketError::IllegalTransition`] unless the table allows `target`.
    pub fn ensure_transition(&self, target: OrderStatus) -> Result<()> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(MarketError::IllegalTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            })
        }
    }

    fn transition_to(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        self.ensure_transition(target)?;
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Records a captured payment. Buyer or administrator.
    pub fn mark_paid(
        &mut self,
        caps: CapabilitySet,
        payment_reference: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_payable(caps)?;
        self.transition_to(OrderStatus::Paid, now)?;
        self.payment_reference = Some(payment_reference);
        self.paid_at = Some(now);
        Ok(())
    }

    /// Validates payment of a pending order and returns the amount to confirm.
    /// Buyer or administrator only.
    pub fn ensure_payable(&self, caps: CapabilitySet) -> Result<Money> {
        require(
            caps,
            &[Capability::Owner, Capability::Administrator],
            "mark an order paid",
        )?;
        self.ensure_transition(OrderStatus::Paid)?;
        Ok(self.amount)
    }

    /// Seller starts work on a paid order.
    pub fn start(&mut self, caps: CapabilitySet, now: DateTime<Utc>) -> Result<()> {
        require(caps, &[Capability::Counterparty], "start an order")?;
        self.transition_to(OrderStatus::InProgress, now)
    }

    /// Seller hands over the work.
    pub fn submit_delivery(
        &mut self,
        caps: CapabilitySet,
        message: String,
        attachments: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(caps, &[Capability::Counterparty], "deliver an order")?;
        self.transition_to(OrderStatus::Delivered, now)?;
        self.delivery = Some(Delivery {
            message,
            attachments,
            delivered_at: now,
        });
        Ok(())
    }

    /// Buyer asks for changes to a delivered order.
    ///
    /// Service orders are limited to the package's included revisions.
    pub fn request_revision(
        &mut self,
        caps: CapabilitySet,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(caps, &[Capability::Owner], "request a revision")?;
        if self.status != OrderStatus::Delivered {
            return Err(MarketError::InvalidState(format!(
                "order {} is {}, revisions can only be requested after delivery",
                self.id, self.status
            )));
        }
        if let Some(included) = self.item.revisions_included() {
            if self.revision_count >= included {
                return Err(MarketError::InvalidState(format!(
                    "order {} has used all {included} included revisions",
                    self.id
                )));
            }
        }
        self.transition_to(OrderStatus::Revision, now)?;
        self.revisions.push(RevisionRequest {
            message,
            requested_at: now,
        });
        self.revision_count = self.revision_count.saturating_add(1);
        Ok(())
    }

    /// Validates completion and returns its external effects. Buyer only.
    ///
    /// Nothing is changed; call [`Order::apply_completion`] once the seller
    /// has been credited.
    pub fn plan_completion(&self, caps: CapabilitySet) -> Result<Settlement> {
        require(caps, &[Capability::Owner], "complete an order")?;
        self.ensure_transition(OrderStatus::Completed)?;
        let (service_id, product_sale) = match &self.item {
            OrderItem::Service { service_id, .. } => (Some(*service_id), None),
            OrderItem::Product {
                product_id,
                quantity,
                ..
            } => (None, Some((*product_id, *quantity))),
        };
        Ok(Settlement {
            seller_id: self.seller_id,
            seller_earning: self.seller_earning,
            service_id,
            product_sale,
        })
    }

    /// Marks a planned completion as done.
    pub fn apply_completion(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Calls the order off. Buyer, seller or administrator, before work starts.
    ///
    /// Returns the stock to put back for product orders.
    pub fn cancel(
        &mut self,
        caps: CapabilitySet,
        cancelled_by: AccountId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Option<(ProductId, u32)>> {
        require(
            caps,
            &[
                Capability::Owner,
                Capability::Counterparty,
                Capability::Administrator,
            ],
            "cancel an order",
        )?;
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Paid) {
            return Err(MarketError::InvalidState(format!(
                "order {} is {}, only pending or paid orders can be cancelled",
                self.id, self.status
            )));
        }
        self.transition_to(OrderStatus::Cancelled, now)?;
        self.cancellation = Some(Cancellation {
            cancelled_by,
            reason,
            cancelled_at: now,
        });
        Ok(self.item.reserved_stock())
    }

    /// Returns true if the quoted split adds up to the amount.
    #[must_use]
    pub fn split_is_exact(&self) -> bool {
        self.platform_fee
            .checked_add(self.seller_earning)
            .is_ok_and(|sum| sum == self.amount)
    }
}
