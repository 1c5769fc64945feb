//! Notification sinks.
//!
//! Signals are fire-and-forget. A sink failure is logged and never undoes
//! the transition that produced the event.

use bazaar_core::{AccountId, BidId, MilestoneId, Money, OrderId, ProjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Something participants may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    /// A client accepted a bid.
    ProjectAwarded {
        /// The project.
        project_id: ProjectId,
        /// The winning bid.
        bid_id: BidId,
        /// The assigned freelancer.
        freelancer_id: AccountId,
        /// Bids that lost.
        rejected: Vec<BidId>,
    },
    /// Escrow was paid out to a freelancer.
    MilestoneReleased {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
        /// The payee.
        freelancer_id: AccountId,
        /// Amount credited after fees.
        net: Money,
    },
    /// A client closed a project.
    ProjectCompleted {
        /// The project.
        project_id: ProjectId,
        /// The freelancer who did the work.
        freelancer_id: Option<AccountId>,
    },
    /// A seller delivered an order.
    OrderDelivered {
        /// The order.
        order_id: OrderId,
        /// The buyer to notify.
        buyer_id: AccountId,
    },
    /// A buyer accepted an order.
    OrderCompleted {
        /// The order.
        order_id: OrderId,
        /// The payee.
        seller_id: AccountId,
        /// Amount credited.
        seller_earning: Money,
    },
}

impl MarketEvent {
    /// Short event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ProjectAwarded { .. } => "project_awarded",
            Self::MilestoneReleased { .. } => "milestone_released",
            Self::ProjectCompleted { .. } => "project_completed",
            Self::OrderDelivered { .. } => "order_delivered",
            Self::OrderCompleted { .. } => "order_completed",
        }
    }
}

/// A sink could not accept an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Destination for market events (email, push, chat, ...).
pub trait NotificationSink: Send + Sync {
    /// Delivers one event.
    fn notify(&self, event: &MarketEvent) -> Result<(), NotifyError>;
}

/// Sink that writes events to the `tracing` infrastructure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, event: &MarketEvent) -> Result<(), NotifyError> {
        let json = serde_json::to_string(event).map_err(|e| NotifyError(e.to_string()))?;
        tracing::info!(
            target: "bazaar_notify",
            event = event.name(),
            event_json = %json,
            "market event"
        );
        Ok(())
    }
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn notify(&self, _event: &MarketEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
