//! Project, award and milestone escrow operations.

use bazaar_core::{AccountId, BidId, FeeRate, MilestoneId, ProjectId};
use bazaar_market::{AwardOutcome, Milestone, MilestoneDraft, Project, ProjectDraft, ProjectRecord};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::marketplace::Marketplace;
use crate::notify::MarketEvent;

/// Milestone transitions that only move status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MilestoneStep {
    Start,
    Submit,
    RequestRevision,
    Approve,
}

impl MilestoneStep {
    const fn name(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Submit => "submitted",
            Self::RequestRevision => "sent back for revision",
            Self::Approve => "approved",
        }
    }
}

impl Marketplace {
    // ==================== Project Lifecycle ====================

    /// Creates a project owned by the actor, as a draft or already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has no account, the budget is empty or
    /// not in the platform currency.
    pub fn create_project(&self, actor: AccountId, draft: ProjectDraft) -> Result<Project> {
        let actor = self.actor(actor)?;
        if !self.store.accounts.contains(&actor.account_id) {
            return Err(EngineError::not_found("account", actor.account_id));
        }
        if draft.budget.currency != self.config.currency {
            return Err(EngineError::InvalidAmount(format!(
                "budget is in {}, the platform settles in {}",
                draft.budget.currency, self.config.currency
            )));
        }

        let project = Project::new(actor.account_id, draft, self.now())?;
        self.store
            .projects
            .insert(project.id, ProjectRecord::new(project.clone()));

        info!(
            project_id = %project.id,
            client_id = %project.client_id,
            status = %project.status,
            "created project"
        );
        Ok(project)
    }

    /// Reads a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist.
    pub fn get_project(&self, actor: AccountId, project_id: ProjectId) -> Result<Project> {
        self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let record = project.lock();
        Ok(record.project.clone())
    }

    /// Opens a draft for bidding. Client only.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the client or the project is not a draft.
    pub fn publish_project(&self, actor: AccountId, project_id: ProjectId) -> Result<Project> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        record.project.publish(caps, now)?;

        info!(project_id = %project_id, "published project");
        Ok(record.project.clone())
    }

    /// Cancels a draft or open project and rejects its open bids.
    ///
    /// Client or administrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor may not cancel or the project was already awarded.
    pub fn cancel_project(&self, actor: AccountId, project_id: ProjectId) -> Result<Project> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let rejected = record.cancel(caps, now)?;

        info!(
            project_id = %project_id,
            cancelled_by = %actor.account_id,
            rejected_bids = rejected.len(),
            "cancelled project"
        );
        Ok(record.project.clone())
    }

    /// Removes a project that never received a bid. Client only.
    ///
    /// The document is marked cancelled before it leaves the store, so a
    /// request that already holds its handle sees a closed project.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once the project has received any bid or has
    /// been awarded; such projects can only be cancelled.
    pub fn delete_project(&self, actor: AccountId, project_id: ProjectId) -> Result<()> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        record.project.ensure_deletable(caps, record.bids.len())?;
        record.cancel(caps, now)?;
        self.store.projects.remove(&project_id);
        drop(record);

        info!(project_id = %project_id, "deleted project");
        Ok(())
    }

    /// Accepts a bid, assigning its bidder and rejecting open siblings.
    ///
    /// Client only. Of two concurrent awards on one project exactly one
    /// succeeds; the other fails with `InvalidState`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown bid, `InvalidBid` for a bid on a
    /// different project and `InvalidState` unless the project is open.
    pub fn award_project(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        bid_id: BidId,
    ) -> Result<AwardOutcome> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        if self.store.project_of_bid(&bid_id).is_none() {
            return Err(EngineError::not_found("bid", bid_id));
        }
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let outcome = record.award(caps, bid_id, now)?;
        drop(record);

        info!(
            project_id = %project_id,
            bid_id = %bid_id,
            freelancer_id = %outcome.freelancer_id,
            amount = %outcome.amount,
            rejected_bids = outcome.rejected.len(),
            "awarded project"
        );
        self.emit(&MarketEvent::ProjectAwarded {
            project_id,
            bid_id,
            freelancer_id: outcome.freelancer_id,
            rejected: outcome.rejected.clone(),
        });
        Ok(outcome)
    }

    /// Closes an awarded project whose escrow is empty. Client only.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the project is in progress with nothing
    /// left in escrow.
    pub fn complete_project(&self, actor: AccountId, project_id: ProjectId) -> Result<Project> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        record.project.complete(caps, now)?;
        let completed = record.project.clone();
        drop(record);

        info!(
            project_id = %project_id,
            total_paid = %completed.total_paid,
            "completed project"
        );
        self.emit(&MarketEvent::ProjectCompleted {
            project_id,
            freelancer_id: completed.assigned_freelancer,
        });
        Ok(completed)
    }

    /// Freezes an in-progress project. Client or assigned freelancer.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not a party or the project is not in progress.
    pub fn open_dispute(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        reason: String,
    ) -> Result<Project> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        record
            .project
            .open_dispute(caps, actor.account_id, reason, now)?;

        info!(project_id = %project_id, opened_by = %actor.account_id, "opened dispute");
        Ok(record.project.clone())
    }

    /// Returns a disputed project to work. Administrator only.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an administrator or the project is not disputed.
    pub fn resolve_dispute(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        resolution: String,
    ) -> Result<Project> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        record.project.resolve_dispute(caps, resolution, now)?;

        info!(project_id = %project_id, resolved_by = %actor.account_id, "resolved dispute");
        Ok(record.project.clone())
    }

    // ==================== Milestone Escrow ====================

    /// Appends a milestone to a live project. Client only.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the client, the project is closed
    /// or the amount is not a positive amount in the budget currency.
    pub fn add_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        draft: MilestoneDraft,
    ) -> Result<Milestone> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let milestone = record.project.add_milestone(caps, draft, now)?.clone();

        info!(
            project_id = %project_id,
            milestone_id = %milestone.id,
            amount = %milestone.amount,
            "added milestone"
        );
        Ok(milestone)
    }

    /// Moves a pending milestone's amount into escrow. Client only.
    ///
    /// The payment authority must confirm that `payment_reference` captured
    /// exactly the milestone amount.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the milestone is not pending, the project is
    /// not in progress, or the capture is not confirmed.
    pub fn fund_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
        payment_reference: String,
    ) -> Result<Milestone> {
        let actor = self.actor(actor)?;
        if payment_reference.trim().is_empty() {
            return Err(EngineError::InvalidState(
                "a payment reference is required".to_string(),
            ));
        }
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let amount = record.project.ensure_fundable(caps, milestone_id)?;
        if !self.payments.confirm_capture(&payment_reference, &amount) {
            return Err(EngineError::PaymentNotCaptured {
                reference: payment_reference,
            });
        }
        let milestone = record
            .project
            .fund_milestone(caps, milestone_id, payment_reference, now)?
            .clone();
        let escrow = record.project.escrow_amount;
        drop(record);

        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            amount = %amount,
            escrow = %escrow,
            "funded milestone"
        );
        Ok(milestone)
    }

    /// Freelancer starts a funded milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the assigned freelancer or the milestone is not funded.
    pub fn start_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        self.milestone_step(actor, project_id, milestone_id, MilestoneStep::Start)
    }

    /// Freelancer hands in a milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the assigned freelancer or the
    /// milestone is neither in progress nor under revision.
    pub fn submit_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        self.milestone_step(actor, project_id, milestone_id, MilestoneStep::Submit)
    }

    /// Client sends a submitted milestone back.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the client or the milestone was not submitted.
    pub fn request_milestone_revision(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        self.milestone_step(actor, project_id, milestone_id, MilestoneStep::RequestRevision)
    }

    /// Client accepts a submitted milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not the client or the milestone was not submitted.
    pub fn approve_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        self.milestone_step(actor, project_id, milestone_id, MilestoneStep::Approve)
    }

    fn milestone_step(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
        step: MilestoneStep,
    ) -> Result<Milestone> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        let doc = &mut record.project;
        let milestone = match step {
            MilestoneStep::Start => doc.start_milestone(caps, milestone_id, now),
            MilestoneStep::Submit => doc.submit_milestone(caps, milestone_id, now),
            MilestoneStep::RequestRevision => {
                doc.request_milestone_revision(caps, milestone_id, now)
            }
            MilestoneStep::Approve => doc.approve_milestone(caps, milestone_id, now),
        }?
        .clone();

        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            status = %milestone.status,
            "milestone {}",
            step.name()
        );
        Ok(milestone)
    }

    /// Pays a milestone out of escrow to the assigned freelancer. Client only.
    ///
    /// The platform keeps the freelancer's current membership fee; the rest
    /// is credited to their available balance. Escrow, the project's paid
    /// total and the freelancer's balance change together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the milestone is funded or approved and
    /// the project is in progress.
    pub fn release_milestone(
        &self,
        actor: AccountId,
        project_id: ProjectId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        let actor = self.actor(actor)?;
        let project = self.project_handle(project_id)?;
        let now = self.now();

        let mut record = project.lock();
        let caps = record.capabilities(&actor);
        // authorization and state errors take precedence over payee lookup
        let freelancer_id = record
            .project
            .plan_release(caps, milestone_id, FeeRate::ZERO)?
            .freelancer_id;

        let payee = self.account_handle(freelancer_id)?;
        let mut account = payee.lock();
        self.refresh(&mut account, now);
        let plan = record
            .project
            .plan_release(caps, milestone_id, account.membership.fee_rate)?;
        account.credit_earnings(plan.split.net, now)?;
        record.project.apply_release(&plan, now);
        drop(account);

        let milestone = record
            .project
            .milestone(milestone_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("milestone", milestone_id))?;
        let escrow = record.project.escrow_amount;
        drop(record);

        info!(
            project_id = %project_id,
            milestone_id = %milestone_id,
            gross = %plan.split.gross,
            fee = %plan.split.fee,
            net = %plan.split.net,
            escrow = %escrow,
            "released milestone"
        );
        self.emit(&MarketEvent::MilestoneReleased {
            project_id,
            milestone_id,
            freelancer_id,
            net: plan.split.net,
        });
        Ok(milestone)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::notify::MarketEvent;
    use crate::testkit::Harness;
    use bazaar_core::{Amount, BidId, Currency};
    use bazaar_market::{BidStatus, Budget, MilestoneStatus, ProjectDraft, ProjectStatus};

    #[test]
    fn budget_must_use_platform_currency() {
        let h = Harness::new();
        let client = h.account("client");
        let draft = ProjectDraft {
            title: "Logo".to_string(),
            description: String::new(),
            budget: Budget {
                min: Amount::from_major(10),
                max: Amount::from_major(20),
                currency: Currency::EUR,
            },
            publish: true,
        };
        let err = h.market.create_project(client, draft).expect_err("EUR");
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn draft_is_published_by_its_client() {
        let h = Harness::new();
        let client = h.account("client");
        let other = h.account("other");
        let project = h.draft_project(client, 100, 500);

        let err = h.market.publish_project(other, project).expect_err("stranger");
        assert_eq!(err.kind(), ErrorKind::NotOwner);
        let published = h.market.publish_project(client, project).expect("publish");
        assert_eq!(published.status, ProjectStatus::Open);
        assert!(published.published_at.is_some());
    }

    #[test]
    fn award_rejects_siblings_and_notifies() {
        let h = Harness::new();
        let client = h.account("client");
        let a = h.account("a");
        let b = h.account("b");
        let c = h.account("c");
        let project = h.open_project(client, 100, 500);
        let bid_a = h.bid(a, project, 300);
        let bid_b = h.bid(b, project, 350);
        let bid_c = h.bid(c, project, 400);
        h.market.withdraw_bid(c, bid_c).expect("withdraw");

        let outcome = h.market.award_project(client, project, bid_b).expect("award");
        assert_eq!(outcome.freelancer_id, b);
        assert_eq!(outcome.rejected, vec![bid_a]);

        let bids = h.market.list_bids(client, project).expect("bids");
        let status_of = |id: BidId| bids.iter().find(|bid| bid.id == id).map(|bid| bid.status);
        assert_eq!(status_of(bid_a), Some(BidStatus::Rejected));
        assert_eq!(status_of(bid_b), Some(BidStatus::Accepted));
        assert_eq!(status_of(bid_c), Some(BidStatus::Withdrawn));

        let awarded = h.project(client, project);
        assert_eq!(awarded.status, ProjectStatus::InProgress);
        assert_eq!(awarded.assigned_freelancer, Some(b));
        assert!(h
            .events()
            .iter()
            .any(|e| matches!(e, MarketEvent::ProjectAwarded { bid_id, .. } if *bid_id == bid_b)));
    }

    #[test]
    fn second_award_fails() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let other = h.account("late");
        let err = h
            .market
            .award_project(s.client, s.project, s.bid)
            .expect_err("already awarded");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = h
            .market
            .place_bid(other, s.project, h.terms(900, 5))
            .expect_err("closed for bids");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn award_with_foreign_or_unknown_bid() {
        let h = Harness::new();
        let client = h.account("client");
        let freelancer = h.account("freelancer");
        let p1 = h.open_project(client, 100, 500);
        let p2 = h.open_project(client, 100, 500);
        let foreign = h.bid(freelancer, p2, 300);

        let err = h.market.award_project(client, p1, foreign).expect_err("foreign");
        assert_eq!(err.kind(), ErrorKind::InvalidBid);
        let err = h
            .market
            .award_project(client, p1, BidId::new())
            .expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn award_by_stranger_is_not_owner() {
        let h = Harness::new();
        let client = h.account("client");
        let freelancer = h.account("freelancer");
        let project = h.open_project(client, 100, 500);
        let bid = h.bid(freelancer, project, 300);

        let err = h
            .market
            .award_project(freelancer, project, bid)
            .expect_err("bidder awarding");
        assert_eq!(err.kind(), ErrorKind::NotOwner);
    }

    #[test]
    fn milestone_release_credits_net_of_fee() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let m = h.milestone(&s, 250);
        h.captures.record("pay_1", h.usd(250));

        let funded = h
            .market
            .fund_milestone(s.client, s.project, m, "pay_1".to_string())
            .expect("fund");
        assert_eq!(funded.status, MilestoneStatus::Funded);
        assert_eq!(h.project(s.client, s.project).escrow_amount, h.usd(250));

        let released = h
            .market
            .release_milestone(s.client, s.project, m)
            .expect("release");
        assert_eq!(released.status, MilestoneStatus::Released);

        let project = h.project(s.client, s.project);
        assert!(project.escrow_amount.is_zero());
        assert_eq!(project.total_paid, h.usd(250));

        // free plan keeps 10%
        let account = h.market.get_account(s.freelancer, s.freelancer).expect("account");
        assert_eq!(account.wallet.available, h.usd(225));
        assert_eq!(account.wallet.lifetime_earned, h.usd(225));
    }

    #[test]
    fn release_twice_is_rejected_without_double_credit() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let m = h.funded_milestone(&s, 100);
        h.market
            .release_milestone(s.client, s.project, m)
            .expect("release");

        let err = h
            .market
            .release_milestone(s.client, s.project, m)
            .expect_err("second release");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let account = h.market.get_account(s.freelancer, s.freelancer).expect("account");
        assert_eq!(account.wallet.available, h.usd(90));
    }

    #[test]
    fn unconfirmed_capture_leaves_milestone_pending() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let m = h.milestone(&s, 100);
        h.captures.record("pay_short", h.usd(99));

        let err = h
            .market
            .fund_milestone(s.client, s.project, m, "pay_short".to_string())
            .expect_err("short capture");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let project = h.project(s.client, s.project);
        assert!(project.escrow_amount.is_zero());
        assert_eq!(
            project.milestone(m).map(|m| m.status),
            Some(MilestoneStatus::Pending)
        );
    }

    #[test]
    fn full_milestone_workflow() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let m = h.funded_milestone(&s, 400);

        let err = h
            .market
            .start_milestone(s.client, s.project, m)
            .expect_err("client cannot start");
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        h.market.start_milestone(s.freelancer, s.project, m).expect("start");
        h.market.submit_milestone(s.freelancer, s.project, m).expect("submit");
        let revised = h
            .market
            .request_milestone_revision(s.client, s.project, m)
            .expect("revision");
        assert_eq!(revised.status, MilestoneStatus::Revision);
        h.market.submit_milestone(s.freelancer, s.project, m).expect("resubmit");
        let approved = h
            .market
            .approve_milestone(s.client, s.project, m)
            .expect("approve");
        assert_eq!(approved.status, MilestoneStatus::Approved);
        h.market
            .release_milestone(s.client, s.project, m)
            .expect("release");

        let completed = h
            .market
            .complete_project(s.client, s.project)
            .expect("complete");
        assert_eq!(completed.status, ProjectStatus::Completed);
        assert!(h
            .events()
            .iter()
            .any(|e| matches!(e, MarketEvent::ProjectCompleted { .. })));
    }

    #[test]
    fn completion_waits_for_escrow_to_drain() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        h.funded_milestone(&s, 100);

        let err = h
            .market
            .complete_project(s.client, s.project)
            .expect_err("escrow held");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn dispute_freezes_until_resolved() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let m = h.funded_milestone(&s, 100);

        let disputed = h
            .market
            .open_dispute(s.freelancer, s.project, "client unresponsive".to_string())
            .expect("dispute");
        assert_eq!(disputed.status, ProjectStatus::Disputed);

        let err = h
            .market
            .release_milestone(s.client, s.project, m)
            .expect_err("frozen");
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = h
            .market
            .resolve_dispute(s.client, s.project, "settled".to_string())
            .expect_err("client cannot resolve");
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let resolved = h
            .market
            .resolve_dispute(h.admin, s.project, "settled".to_string())
            .expect("admin resolves");
        assert_eq!(resolved.status, ProjectStatus::InProgress);
        h.market
            .release_milestone(s.client, s.project, m)
            .expect("release after resolution");
    }

    #[test]
    fn cancel_rejects_open_bids() {
        let h = Harness::new();
        let client = h.account("client");
        let freelancer = h.account("freelancer");
        let project = h.open_project(client, 100, 500);
        let bid = h.bid(freelancer, project, 300);

        let cancelled = h.market.cancel_project(client, project).expect("cancel");
        assert_eq!(cancelled.status, ProjectStatus::Cancelled);
        let bids = h.market.list_bids(client, project).expect("bids");
        assert_eq!(bids[0].id, bid);
        assert_eq!(bids[0].status, BidStatus::Rejected);
    }

    #[test]
    fn awarded_project_cannot_be_cancelled() {
        let h = Harness::new();
        let s = h.awarded(1_000);
        let err = h
            .market
            .cancel_project(s.client, s.project)
            .expect_err("in progress");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn delete_only_without_bids() {
        let h = Harness::new();
        let client = h.account("client");
        let freelancer = h.account("freelancer");
        let empty = h.open_project(client, 100, 500);
        let bid_on = h.open_project(client, 100, 500);
        let bid = h.bid(freelancer, bid_on, 300);
        h.market.withdraw_bid(freelancer, bid).expect("withdraw");

        h.market.delete_project(client, empty).expect("delete");
        let err = h.market.get_project(client, empty).expect_err("gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = h
            .market
            .delete_project(client, bid_on)
            .expect_err("had a bid");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
