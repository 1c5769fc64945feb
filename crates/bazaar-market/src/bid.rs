//! Bids and the per-project bid book.

use std::collections::BTreeMap;
use std::fmt;

use bazaar_core::{AccountId, BidId, Capability, CapabilitySet, Money, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require, MarketError, Result};

/// The state of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// Submitted, awaiting the client.
    Pending,
    /// Marked by the client as a candidate.
    Shortlisted,
    /// Won the project.
    Accepted,
    /// Lost the project, or the project was cancelled.
    Rejected,
    /// Retracted by the bidder.
    Withdrawn,
}

impl BidStatus {
    /// Returns true once no further status change is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }

    /// Returns true if the bid can still win the project.
    #[must_use]
    pub const fn is_awardable(self) -> bool {
        matches!(self, Self::Pending | Self::Shortlisted)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Shortlisted => "shortlisted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        };
        f.write_str(s)
    }
}

/// The commercial content of a bid, as submitted or edited by the bidder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTerms {
    /// Price the bidder asks for the whole project.
    pub amount: Money,
    /// Promised delivery time in days.
    pub delivery_days: u32,
    /// Cover letter.
    pub proposal: String,
}

impl BidTerms {
    fn validate(&self) -> Result<()> {
        if self.amount.is_zero() {
            return Err(MarketError::InvalidAmount(
                "bid amount must be positive".to_string(),
            ));
        }
        if self.delivery_days == 0 {
            return Err(MarketError::InvalidBid(
                "delivery estimate must be at least one day".to_string(),
            ));
        }
        if self.proposal.trim().is_empty() {
            return Err(MarketError::InvalidBid("proposal is empty".to_string()));
        }
        Ok(())
    }
}

/// A bidder's offer on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Unique bid ID.
    pub id: BidId,
    /// The project bid on.
    pub project_id: ProjectId,
    /// The bidding account; owns the bid.
    pub bidder_id: AccountId,
    /// Current offer.
    pub terms: BidTerms,
    /// Current state.
    pub status: BidStatus,
    /// When the bid was placed.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// When the client shortlisted the bid.
    pub shortlisted_at: Option<DateTime<Utc>>,
    /// When the bid won.
    pub accepted_at: Option<DateTime<Utc>>,
    /// When the bid lost.
    pub rejected_at: Option<DateTime<Utc>>,
    /// When the bidder withdrew.
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl Bid {
    /// Creates a pending bid after validating its terms.
    pub fn new(
        project_id: ProjectId,
        bidder_id: AccountId,
        terms: BidTerms,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        terms.validate()?;
        Ok(Self {
            id: BidId::new(),
            project_id,
            bidder_id,
            terms,
            status: BidStatus::Pending,
            created_at: now,
            updated_at: now,
            shortlisted_at: None,
            accepted_at: None,
            rejected_at: None,
            withdrawn_at: None,
        })
    }

    fn ensure_pending(&self, action: &str) -> Result<()> {
        if self.status == BidStatus::Pending {
            Ok(())
        } else {
            Err(MarketError::InvalidState(format!(
                "bid {} is {}, cannot {action}",
                self.id, self.status
            )))
        }
    }

    /// Replaces the terms of a pending bid. Bidder only.
    pub fn edit(&mut self, caps: CapabilitySet, terms: BidTerms, now: DateTime<Utc>) -> Result<()> {
        require(caps, &[Capability::Owner], "edit a bid")?;
        self.ensure_pending("edit")?;
        terms.validate()?;
        self.terms = terms;
        self.updated_at = now;
        Ok(())
    }

    /// Retracts a pending bid. Bidder only.
    pub fn withdraw(&mut self, caps: CapabilitySet, now: DateTime<Utc>) -> Result<()> {
        require(caps, &[Capability::Owner], "withdraw a bid")?;
        self.ensure_pending("withdraw")?;
        self.status = BidStatus::Withdrawn;
        self.withdrawn_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub(crate) fn shortlist(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("shortlist")?;
        self.status = BidStatus::Shortlisted;
        self.shortlisted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn accept(&mut self, now: DateTime<Utc>) {
        self.status = BidStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    fn reject(&mut self, now: DateTime<Utc>) {
        self.status = BidStatus::Rejected;
        self.rejected_at = Some(now);
        self.updated_at = now;
    }
}

/// All bids on one project, with the (project, bidder) uniqueness index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidBook {
    bids: BTreeMap<BidId, Bid>,
    by_bidder: BTreeMap<AccountId, BidId>,
}

impl BidBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a bid.
    #[must_use]
    pub fn get(&self, id: BidId) -> Option<&Bid> {
        self.bids.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BidId) -> Result<&mut Bid> {
        self.bids
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound(format!("bid {id}")))
    }

    /// Returns the bid placed by `bidder`, whatever its status.
    #[must_use]
    pub fn by_bidder(&self, bidder: AccountId) -> Option<&Bid> {
        self.by_bidder.get(&bidder).and_then(|id| self.bids.get(id))
    }

    /// Iterates bids in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Bid> {
        self.bids.values()
    }

    /// Number of bids ever placed, withdrawn ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len()
    }

    /// Returns true if no bid was ever placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// Fails with [`MarketError::DuplicateBid`] if `bidder` already bid.
    ///
    /// Withdrawn bids still occupy the bidder's slot.
    pub fn ensure_no_bid_from(&self, project: ProjectId, bidder: AccountId) -> Result<()> {
        if self.by_bidder.contains_key(&bidder) {
            Err(MarketError::DuplicateBid { project, bidder })
        } else {
            Ok(())
        }
    }

    /// Adds a validated bid.
    pub(crate) fn insert(&mut self, bid: Bid) -> Result<()> {
        self.ensure_no_bid_from(bid.project_id, bid.bidder_id)?;
        self.by_bidder.insert(bid.bidder_id, bid.id);
        self.bids.insert(bid.id, bid);
        Ok(())
    }

    /// Marks `winner` accepted and every other open bid rejected.
    ///
    /// Returns the IDs of the rejected siblings. Withdrawn bids keep their
    /// status. Nothing changes unless the winner is still awardable.
    pub fn resolve_award(&mut self, winner: BidId, now: DateTime<Utc>) -> Result<Vec<BidId>> {
        let bid = self
            .bids
            .get(&winner)
            .ok_or_else(|| MarketError::InvalidBid(format!("bid {winner} is not on this project")))?;
        if !bid.status.is_awardable() {
            return Err(MarketError::InvalidState(format!(
                "bid {winner} is {} and cannot be accepted",
                bid.status
            )));
        }

        let mut rejected = Vec::new();
        for bid in self.bids.values_mut() {
            if bid.id == winner {
                bid.accept(now);
            } else if bid.status.is_awardable() {
                bid.reject(now);
                rejected.push(bid.id);
            }
        }
        Ok(rejected)
    }

    /// Rejects every open bid, e.g. when the project is cancelled.
    pub(crate) fn reject_open(&mut self, now: DateTime<Utc>) -> Vec<BidId> {
        self.bids
            .values_mut()
            .filter(|bid| bid.status.is_awardable())
            .map(|bid| {
                bid.reject(now);
                bid.id
            })
            .collect()
    }

    /// Number of bids with status `accepted`.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.bids
            .values()
            .filter(|bid| bid.status == BidStatus::Accepted)
            .count()
    }
}
