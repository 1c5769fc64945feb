//! Fixed-scope projects and milestone escrow.

use std::fmt;

use bazaar_core::{
    AccountId, Amount, BidId, Capability, CapabilitySet, Currency, FeeRate, FeeSplit,
    MilestoneId, Money, ProjectId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require, MarketError, Result};
use crate::milestone::{Milestone, MilestoneDraft, MilestoneStatus};

/// The state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Being written; not visible to bidders.
    Draft,
    /// Accepting bids.
    Open,
    /// Awarded to a freelancer.
    InProgress,
    /// Finished.
    Completed,
    /// Withdrawn by the client before award.
    Cancelled,
    /// Frozen pending administrator review.
    Disputed,
}

impl ProjectStatus {
    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        use ProjectStatus::{Cancelled, Completed, Disputed, Draft, InProgress, Open};

        matches!(
            (self, target),
            (Draft, Open)
                | (Draft | Open, Cancelled)
                | (Open | Disputed, InProgress)
                | (InProgress, Completed | Disputed)
        )
    }

    /// Returns true once no further status change is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// The client's price range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Lower bound.
    pub min: Amount,
    /// Upper bound.
    pub max: Amount,
    /// Currency of both bounds, of bids and of milestones.
    pub currency: Currency,
}

impl Budget {
    fn validate(&self) -> Result<()> {
        if self.max.is_zero() || self.min > self.max {
            return Err(MarketError::InvalidAmount(format!(
                "budget {}..{} {} is empty",
                self.min, self.max, self.currency
            )));
        }
        Ok(())
    }

    /// Fails unless `money` is a positive amount in the budget currency.
    pub fn ensure_payable(&self, money: &Money, what: &str) -> Result<()> {
        if money.currency != self.currency {
            return Err(MarketError::InvalidAmount(format!(
                "{what} is in {}, project budget is in {}",
                money.currency, self.currency
            )));
        }
        if money.is_zero() {
            return Err(MarketError::InvalidAmount(format!("{what} must be positive")));
        }
        Ok(())
    }
}

/// Client-supplied project definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    /// Headline.
    pub title: String,
    /// Scope of work.
    #[serde(default)]
    pub description: String,
    /// Price range.
    pub budget: Budget,
    /// Open for bids immediately instead of starting as a draft.
    #[serde(default)]
    pub publish: bool,
}

/// Terms fixed when a bid is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreedTerms {
    /// The accepted bid.
    pub bid_id: BidId,
    /// Agreed price.
    pub amount: Money,
    /// Agreed delivery time in days.
    pub delivery_days: u32,
    /// When the award happened.
    pub awarded_at: DateTime<Utc>,
}

/// An open or resolved dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Party that raised it.
    pub opened_by: AccountId,
    /// Stated reason.
    pub reason: String,
    /// When it was raised.
    pub opened_at: DateTime<Utc>,
    /// Administrator's resolution note.
    pub resolution: Option<String>,
    /// When it was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A validated milestone release, ready to be applied.
///
/// Produced by [`Project::plan_release`] without mutating anything so the
/// caller can credit the freelancer first; [`Project::apply_release`] then
/// cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    /// The milestone being released.
    pub milestone_id: MilestoneId,
    /// Payee.
    pub freelancer_id: AccountId,
    /// Gross amount, platform fee and the freelancer's net share.
    pub split: FeeSplit,
    index: usize,
    escrow_after: Money,
    total_paid_after: Money,
}

/// A fixed-scope job that freelancers bid on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID.
    pub id: ProjectId,
    /// Posting client; owns the project.
    pub client_id: AccountId,
    /// Headline.
    pub title: String,
    /// Scope of work.
    pub description: String,
    /// Price range.
    pub budget: Budget,
    /// Current state.
    pub status: ProjectStatus,
    /// Freelancer whose bid won.
    pub assigned_freelancer: Option<AccountId>,
    /// Terms of the accepted bid.
    pub agreed: Option<AgreedTerms>,
    /// Payable slices of the work, in order.
    pub milestones: Vec<Milestone>,
    /// Funded but unreleased milestone money.
    pub escrow_amount: Money,
    /// Released milestone money.
    pub total_paid: Money,
    /// Bids currently standing (placed minus withdrawn).
    pub bid_count: u32,
    /// Latest dispute, if any.
    pub dispute: Option<Dispute>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// When bidding opened.
    pub published_at: Option<DateTime<Utc>>,
    /// When the client closed the project.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the client cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Creates a project in `draft`, or `open` when the draft asks to publish.
    pub fn new(client_id: AccountId, draft: ProjectDraft, now: DateTime<Utc>) -> Result<Self> {
        draft.budget.validate()?;
        if draft.title.trim().is_empty() {
            return Err(MarketError::InvalidState("project title is empty".to_string()));
        }
        let (status, published_at) = if draft.publish {
            (ProjectStatus::Open, Some(now))
        } else {
            (ProjectStatus::Draft, None)
        };
        Ok(Self {
            id: ProjectId::new(),
            client_id,
            title: draft.title,
            description: draft.description,
            budget: draft.budget,
            status,
            assigned_freelancer: None,
            agreed: None,
            milestones: Vec::new(),
            escrow_amount: Money::zero(draft.budget.currency),
            total_paid: Money::zero(draft.budget.currency),
            bid_count: 0,
            dispute: None,
            created_at: now,
            updated_at: now,
            published_at,
            completed_at: None,
            cancelled_at: None,
        })
    }

    /// Returns the freelancer's milestone by ID.
    #[must_use]
    pub fn milestone(&self, id: MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    fn milestone_index(&self, id: MilestoneId) -> Result<usize> {
        self.milestones
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MarketError::NotFound(format!("milestone {id} on project {}", self.id)))
    }

    pub(crate) fn ensure_status(&self, expected: ProjectStatus, action: &str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(MarketError::InvalidState(format!(
                "project {} is {}, cannot {action}",
                self.id, self.status
            )))
        }
    }

    pub(crate) fn transition_to(&mut self, target: ProjectStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(MarketError::InvalidState(format!(
                "project {} is {}, cannot move to {target}",
                self.id, self.status
            )));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Opens a draft for bidding. Client only.
    pub fn publish(&mut self, caps: CapabilitySet, now: DateTime<Utc>) -> Result<()> {
        require(caps, &[Capability::Owner], "publish a project")?;
        self.transition_to(ProjectStatus::Open, now)?;
        self.published_at = Some(now);
        Ok(())
    }

    /// Fails unless the project may be hard-deleted by this actor.
    ///
    /// Only a draft or open project that never received a bid qualifies.
    pub fn ensure_deletable(&self, caps: CapabilitySet, bids_ever_placed: usize) -> Result<()> {
        require(caps, &[Capability::Owner], "delete a project")?;
        if !matches!(self.status, ProjectStatus::Draft | ProjectStatus::Open) {
            return Err(MarketError::InvalidState(format!(
                "project {} is {}, only drafts and open projects can be deleted",
                self.id, self.status
            )));
        }
        if bids_ever_placed > 0 {
            return Err(MarketError::InvalidState(format!(
                "project {} has received bids and can only be cancelled",
                self.id
            )));
        }
        Ok(())
    }

    /// Appends a milestone. Client only, while the project is live.
    pub fn add_milestone(
        &mut self,
        caps: CapabilitySet,
        draft: MilestoneDraft,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        require(caps, &[Capability::Owner], "add a milestone")?;
        if self.status.is_terminal() {
            return Err(MarketError::InvalidState(format!(
                "project {} is {}",
                self.id, self.status
            )));
        }
        self.budget.ensure_payable(&draft.amount, "milestone amount")?;
        let milestone = Milestone::new(draft)?;
        self.milestones.push(milestone);
        self.updated_at = now;
        self.milestones
            .last()
            .ok_or_else(|| MarketError::InvalidState("milestone was not recorded".to_string()))
    }

    /// Validates funding of a pending milestone. Client only, after award.
    pub fn ensure_fundable(&self, caps: CapabilitySet, id: MilestoneId) -> Result<Money> {
        require(caps, &[Capability::Owner], "fund a milestone")?;
        self.ensure_status(ProjectStatus::InProgress, "fund a milestone")?;
        let milestone = &self.milestones[self.milestone_index(id)?];
        milestone.ensure_transition(MilestoneStatus::Funded)?;
        Ok(milestone.amount)
    }

    /// Moves a pending milestone to `funded` and adds it to escrow.
    ///
    /// The caller is responsible for confirming the payment capture first.
    pub fn fund_milestone(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        payment_reference: String,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        let amount = self.ensure_fundable(caps, id)?;
        let escrow = self.escrow_amount.checked_add(amount)?;
        let index = self.milestone_index(id)?;

        self.milestones[index].transition_to(MilestoneStatus::Funded, now)?;
        self.milestones[index].payment_reference = Some(payment_reference);
        self.escrow_amount = escrow;
        self.updated_at = now;
        Ok(&self.milestones[index])
    }

    fn milestone_step(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        required: Capability,
        target: MilestoneStatus,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        require(caps, &[required], action)?;
        self.ensure_status(ProjectStatus::InProgress, action)?;
        let index = self.milestone_index(id)?;
        self.milestones[index].transition_to(target, now)?;
        self.updated_at = now;
        Ok(&self.milestones[index])
    }

    /// Freelancer starts work on a funded milestone.
    pub fn start_milestone(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        self.milestone_step(
            caps,
            id,
            Capability::Counterparty,
            MilestoneStatus::InProgress,
            "start a milestone",
            now,
        )
    }

    /// Freelancer hands in work.
    pub fn submit_milestone(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        self.milestone_step(
            caps,
            id,
            Capability::Counterparty,
            MilestoneStatus::Submitted,
            "submit a milestone",
            now,
        )
    }

    /// Client sends submitted work back.
    pub fn request_milestone_revision(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        self.milestone_step(
            caps,
            id,
            Capability::Owner,
            MilestoneStatus::Revision,
            "request a milestone revision",
            now,
        )
    }

    /// Client accepts submitted work.
    pub fn approve_milestone(
        &mut self,
        caps: CapabilitySet,
        id: MilestoneId,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        self.milestone_step(
            caps,
            id,
            Capability::Owner,
            MilestoneStatus::Approved,
            "approve a milestone",
            now,
        )
    }

    /// Validates a release and computes its effects without applying them.
    ///
    /// Client only; the milestone must be `funded` or `approved`.
    pub fn plan_release(
        &self,
        caps: CapabilitySet,
        id: MilestoneId,
        fee_rate: FeeRate,
    ) -> Result<ReleasePlan> {
        require(caps, &[Capability::Owner], "release a milestone")?;
        self.ensure_status(ProjectStatus::InProgress, "release a milestone")?;
        let index = self.milestone_index(id)?;
        let milestone = &self.milestones[index];
        milestone.ensure_transition(MilestoneStatus::Released)?;
        let freelancer_id = self.assigned_freelancer.ok_or_else(|| {
            MarketError::InvalidState(format!("project {} has no freelancer", self.id))
        })?;

        let escrow_after = self.escrow_amount.checked_sub(milestone.amount)?;
        let total_paid_after = self.total_paid.checked_add(milestone.amount)?;
        Ok(ReleasePlan {
            milestone_id: id,
            freelancer_id,
            split: fee_rate.split(milestone.amount),
            index,
            escrow_after,
            total_paid_after,
        })
    }

    /// Applies a plan produced by [`Project::plan_release`] on this project.
    pub fn apply_release(&mut self, plan: &ReleasePlan, now: DateTime<Utc>) {
        let milestone = &mut self.milestones[plan.index];
        milestone.status = MilestoneStatus::Released;
        milestone.released_at = Some(now);
        self.escrow_amount = plan.escrow_after;
        self.total_paid = plan.total_paid_after;
        self.updated_at = now;
    }

    /// Closes an awarded project. Client only.
    ///
    /// Moves no money; fails while funded milestones are still in escrow.
    pub fn complete(&mut self, caps: CapabilitySet, now: DateTime<Utc>) -> Result<()> {
        require(caps, &[Capability::Owner], "complete a project")?;
        self.ensure_status(ProjectStatus::InProgress, "complete")?;
        if !self.escrow_amount.is_zero() {
            return Err(MarketError::InvalidState(format!(
                "project {} still holds {} in escrow",
                self.id, self.escrow_amount
            )));
        }
        self.transition_to(ProjectStatus::Completed, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Freezes an awarded project. Client or assigned freelancer.
    pub fn open_dispute(
        &mut self,
        caps: CapabilitySet,
        opened_by: AccountId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(
            caps,
            &[Capability::Owner, Capability::Counterparty],
            "open a dispute",
        )?;
        self.ensure_status(ProjectStatus::InProgress, "open a dispute")?;
        self.transition_to(ProjectStatus::Disputed, now)?;
        self.dispute = Some(Dispute {
            opened_by,
            reason,
            opened_at: now,
            resolution: None,
            resolved_at: None,
        });
        Ok(())
    }

    /// Returns a disputed project to work. Administrator only.
    pub fn resolve_dispute(
        &mut self,
        caps: CapabilitySet,
        resolution: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require(caps, &[Capability::Administrator], "resolve a dispute")?;
        self.ensure_status(ProjectStatus::Disputed, "resolve a dispute")?;
        self.transition_to(ProjectStatus::InProgress, now)?;
        if let Some(dispute) = self.dispute.as_mut() {
            dispute.resolution = Some(resolution);
            dispute.resolved_at = Some(now);
        }
        Ok(())
    }

    /// Returns true if the escrow balance equals the sum of held milestones.
    #[must_use]
    pub fn escrow_matches_milestones(&self) -> bool {
        self.milestones
            .iter()
            .filter(|m| m.status.holds_escrow())
            .try_fold(Money::zero(self.budget.currency), |acc, m| {
                acc.checked_add(m.amount)
            })
            .is_ok_and(|held| held == self.escrow_amount)
    }
}
