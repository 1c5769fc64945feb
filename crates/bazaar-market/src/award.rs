//! The project aggregate: a project together with its bid book.
//!
//! Every operation that touches both a project and its bids lives here so
//! that one lock around a [`ProjectRecord`] makes the combination atomic.

use bazaar_core::{AccountId, Actor, BidId, Capability, CapabilitySet, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bid::{Bid, BidBook, BidTerms};
use crate::error::{require, MarketError, Result};
use crate::project::{AgreedTerms, Project, ProjectStatus};

/// What an award changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
    /// The winning bid.
    pub accepted: BidId,
    /// The winning bidder, now assigned to the project.
    pub freelancer_id: AccountId,
    /// Agreed price.
    pub amount: Money,
    /// Siblings that were rejected.
    pub rejected: Vec<BidId>,
}

/// A project and every bid placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// The project document.
    pub project: Project,
    /// Its bids.
    pub bids: BidBook,
}

impl ProjectRecord {
    /// Wraps a freshly created project.
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self {
            project,
            bids: BidBook::new(),
        }
    }

    /// Capabilities of `actor` over this project.
    #[must_use]
    pub fn capabilities(&self, actor: &Actor) -> CapabilitySet {
        actor.capabilities(self.project.client_id, self.project.assigned_freelancer)
    }

    /// Builds a bid for `bidder` after every project-side check.
    ///
    /// Nothing is recorded; pass the result to [`ProjectRecord::insert_bid`]
    /// once the bidder's quota slot is reserved.
    pub fn prepare_bid(&self, bidder: AccountId, terms: BidTerms, now: DateTime<Utc>) -> Result<Bid> {
        let project = &self.project;
        project.ensure_status(ProjectStatus::Open, "accept bids")?;
        if bidder == project.client_id {
            return Err(MarketError::SelfBidding(project.id));
        }
        self.bids.ensure_no_bid_from(project.id, bidder)?;
        project.budget.ensure_payable(&terms.amount, "bid amount")?;
        Bid::new(project.id, bidder, terms, now)
    }

    /// Records a bid built by [`ProjectRecord::prepare_bid`].
    pub fn insert_bid(&mut self, bid: Bid, now: DateTime<Utc>) -> Result<&Bid> {
        let id = bid.id;
        self.bids.insert(bid)?;
        self.project.bid_count = self.project.bid_count.saturating_add(1);
        self.project.updated_at = now;
        self.bids
            .get(id)
            .ok_or_else(|| MarketError::NotFound(format!("bid {id}")))
    }

    /// Replaces the terms of a pending bid. Bidder only.
    pub fn edit_bid(
        &mut self,
        actor: &Actor,
        id: BidId,
        terms: BidTerms,
        now: DateTime<Utc>,
    ) -> Result<&Bid> {
        let budget = self.project.budget;
        let bid = self.bids.get_mut(id)?;
        let caps = actor.capabilities(bid.bidder_id, None);
        require(caps, &[Capability::Owner], "edit a bid")?;
        budget.ensure_payable(&terms.amount, "bid amount")?;
        bid.edit(caps, terms, now)?;
        Ok(&*bid)
    }

    /// Withdraws a pending bid. Bidder only; the quota slot is not refunded.
    pub fn withdraw_bid(
        &mut self,
        actor: &Actor,
        id: BidId,
        now: DateTime<Utc>,
    ) -> Result<&Bid> {
        let bid = self.bids.get_mut(id)?;
        let caps = actor.capabilities(bid.bidder_id, None);
        bid.withdraw(caps, now)?;
        self.project.bid_count = self.project.bid_count.saturating_sub(1);
        self.project.updated_at = now;
        self.bids
            .get(id)
            .ok_or_else(|| MarketError::NotFound(format!("bid {id}")))
    }

    /// Marks a pending bid as a candidate. Client only, while open.
    pub fn shortlist_bid(&mut self, caps: CapabilitySet, id: BidId, now: DateTime<Utc>) -> Result<&Bid> {
        require(caps, &[Capability::Owner], "shortlist a bid")?;
        self.project.ensure_status(ProjectStatus::Open, "shortlist bids")?;
        let bid = self.bids.get_mut(id)?;
        bid.shortlist(now)?;
        Ok(&*bid)
    }

    /// Accepts `bid_id` and moves the project to `in_progress`.
    ///
    /// Client only. Only an `open` project can be awarded, so of two racing
    /// awards on the same record the second always fails with
    /// [`MarketError::InvalidState`].
    pub fn award(&mut self, caps: CapabilitySet, bid_id: BidId, now: DateTime<Utc>) -> Result<AwardOutcome> {
        require(caps, &[Capability::Owner], "award a project")?;
        let bid = self.bids.get(bid_id).ok_or_else(|| {
            MarketError::InvalidBid(format!(
                "bid {bid_id} does not belong to project {}",
                self.project.id
            ))
        })?;
        self.project.ensure_status(ProjectStatus::Open, "award")?;
        let freelancer_id = bid.bidder_id;
        let agreed = AgreedTerms {
            bid_id,
            amount: bid.terms.amount,
            delivery_days: bid.terms.delivery_days,
            awarded_at: now,
        };

        let rejected = self.bids.resolve_award(bid_id, now)?;
        self.project.transition_to(ProjectStatus::InProgress, now)?;
        self.project.assigned_freelancer = Some(freelancer_id);
        let amount = agreed.amount;
        self.project.agreed = Some(agreed);
        debug!(
            project_id = %self.project.id,
            bid_id = %bid_id,
            rejected = rejected.len(),
            "resolved award"
        );

        Ok(AwardOutcome {
            accepted: bid_id,
            freelancer_id,
            amount,
            rejected,
        })
    }

    /// Cancels a draft or open project, rejecting its open bids.
    ///
    /// Client or administrator.
    pub fn cancel(&mut self, caps: CapabilitySet, now: DateTime<Utc>) -> Result<Vec<BidId>> {
        require(
            caps,
            &[Capability::Owner, Capability::Administrator],
            "cancel a project",
        )?;
        self.project.transition_to(ProjectStatus::Cancelled, now)?;
        self.project.cancelled_at = Some(now);
        Ok(self.bids.reject_open(now))
    }

    /// Bids in ID order.
    pub fn list_bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter()
    }
}
