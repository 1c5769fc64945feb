//! Bid operations.
//!
//! Placing a bid touches two documents: the project (duplicate and status
//! checks, insertion) and the bidder's account (quota). Both are locked for
//! the whole operation, project first, and the quota slot is only reserved
//! once every project-side check has passed.

use bazaar_core::{AccountId, BidId, Capability, ProjectId};
use bazaar_market::{Bid, BidTerms, ProjectRecord};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::marketplace::Marketplace;
use crate::store::Shared;

impl Marketplace {
    // ==================== Bid Operations ====================

    /// Places a bid on an open project.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` unless the project is open, `SelfBidding` for
    /// the project's own client, `DuplicateBid` for a second bid (withdrawn
    /// bids included), `InvalidAmount` for a bad amount and `QuotaExhausted`
    /// when the bidder has no slots left. No slot is consumed on failure.
    pub fn place_bid(&self, actor: AccountId, project_id: ProjectId, terms: BidTerms) -> Result<Bid> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let bidder = self.account_handle(actor.account_id)?;
        let now = self.now();

        let mut record = project.lock();
        let bid = record.prepare_bid(actor.account_id, terms, now)?;

        let remaining = {
            let mut account = bidder.lock();
            self.refresh(&mut account, now);
            account.reserve_bid_slot(now)?
        };

        let bid = record.insert_bid(bid, now)?.clone();
        drop(record);
        self.store.index_bid(bid.id, project_id);

        info!(
            project_id = %project_id,
            bid_id = %bid.id,
            bidder_id = %bid.bidder_id,
            amount = %bid.terms.amount,
            bids_remaining = %remaining,
            "placed bid"
        );
        Ok(bid)
    }

    /// Replaces the terms of a pending bid. Bidder only.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid does not exist, belongs to someone else or
    /// is no longer pending.
    pub fn edit_bid(&self, actor: AccountId, bid_id: BidId, terms: BidTerms) -> Result<Bid> {
        let actor = self.actor(actor)?;
        let project = self.project_of_bid(bid_id)?;
        let now = self.now();

        let mut record = project.lock();
        let bid = record.edit_bid(&actor, bid_id, terms, now)?.clone();

        info!(bid_id = %bid_id, amount = %bid.terms.amount, "edited bid");
        Ok(bid)
    }

    /// Withdraws a pending bid. Bidder only.
    ///
    /// The quota slot spent on the bid is not refunded, and the bidder may
    /// not bid on the same project again.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid does not exist, belongs to someone else or
    /// is no longer pending.
    pub fn withdraw_bid(&self, actor: AccountId, bid_id: BidId) -> Result<Bid> {
        let actor = self.actor(actor)?;
        let project = self.project_of_bid(bid_id)?;
        let now = self.now();

        let mut record = project.lock();
        let bid = record.withdraw_bid(&actor, bid_id, now)?.clone();

        info!(bid_id = %bid_id, project_id = %bid.project_id, "withdrew bid");
        Ok(bid)
    }

    /// Marks a pending bid as a candidate. Project client only.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid does not exist, the actor is not the
    /// client, or the project is no longer open.
    pub fn shortlist_bid(&self, actor: AccountId, bid_id: BidId) -> Result<Bid> {
        let actor = self.actor(actor)?;
        let project = self.project_of_bid(bid_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let bid = record.shortlist_bid(caps, bid_id, now)?.clone();

        info!(bid_id = %bid_id, project_id = %bid.project_id, "shortlisted bid");
        Ok(bid)
    }

    /// Lists a project's bids.
    ///
    /// The client and administrators see every bid; anyone else sees only
    /// their own.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist.
    pub fn list_bids(&self, actor: AccountId, project_id: ProjectId) -> Result<Vec<Bid>> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;

        let record = project.lock();
        let caps = record.capabilities(&actor);
        let sees_all = caps.has_any(&[Capability::Owner, Capability::Administrator]);
        Ok(record
            .list_bids()
            .filter(|bid| sees_all || bid.bidder_id == actor.account_id)
            .cloned()
            .collect())
    }

    pub(crate) fn project_of_bid(&self, bid_id: BidId) -> Result<Shared<ProjectRecord>> {
        let project_id = self
            .store
            .project_of_bid(&bid_id)
            .ok_or_else(|| EngineError::not_found("bid", bid_id))?;
        self.project_handle(project_id)
    }
}
