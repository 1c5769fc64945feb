//! Project milestones and their escrow sub-state-machine.
//!
//! ```text
//! pending ─► funded ─► in_progress ─► submitted ─► approved ─► released
//!              │                        ▲    │                    ▲
//!              │                        │    ▼                    │
//!              │                       revision                   │
//!              └──────────────────────────────────────────────────┘
//! ```

use std::fmt;

use bazaar_core::{MilestoneId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// The state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Defined, no money held.
    Pending,
    /// Funds captured and held in escrow.
    Funded,
    /// Freelancer is working on it.
    InProgress,
    /// Work handed in for review.
    Submitted,
    /// Client asked for changes.
    Revision,
    /// Client accepted the work.
    Approved,
    /// Escrow paid out to the freelancer.
    Released,
}

impl MilestoneStatus {
    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        use MilestoneStatus::{Approved, Funded, InProgress, Pending, Released, Revision, Submitted};

        matches!(
            (self, target),
            (Pending, Funded)
                | (Funded, InProgress)
                | (InProgress | Revision, Submitted)
                | (Submitted, Revision | Approved)
                | (Funded | Approved, Released)
        )
    }

    /// Returns true while the milestone's amount sits in escrow.
    #[must_use]
    pub const fn holds_escrow(self) -> bool {
        matches!(
            self,
            Self::Funded | Self::InProgress | Self::Submitted | Self::Revision | Self::Approved
        )
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Funded => "funded",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Revision => "revision",
            Self::Approved => "approved",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

/// Client-supplied milestone definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    /// Short description of the deliverable.
    pub title: String,
    /// Amount paid on release.
    pub amount: Money,
    /// Optional due date.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

/// A payable slice of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique milestone ID.
    pub id: MilestoneId,
    /// Short description of the deliverable.
    pub title: String,
    /// Amount paid on release.
    pub amount: Money,
    /// Optional due date.
    pub due_at: Option<DateTime<Utc>>,
    /// Current state.
    pub status: MilestoneStatus,
    /// Payment capture reference supplied when funding.
    pub payment_reference: Option<String>,
    /// Number of revision rounds requested.
    pub revision_count: u32,
    /// When funds were captured.
    pub funded_at: Option<DateTime<Utc>>,
    /// Last submission.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the client approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// When escrow was paid out.
    pub released_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub(crate) fn new(draft: MilestoneDraft) -> Result<Self> {
        if draft.amount.is_zero() {
            return Err(MarketError::InvalidAmount(
                "milestone amount must be positive".to_string(),
            ));
        }
        if draft.title.trim().is_empty() {
            return Err(MarketError::InvalidState("milestone title is empty".to_string()));
        }
        Ok(Self {
            id: MilestoneId::new(),
            title: draft.title,
            amount: draft.amount,
            due_at: draft.due_at,
            status: MilestoneStatus::Pending,
            payment_reference: None,
            revision_count: 0,
            funded_at: None,
            submitted_at: None,
            approved_at: None,
            released_at: None,
        })
    }

    /// Fails unless the milestone may move to `target`.
    pub(crate) fn ensure_transition(&self, target: MilestoneStatus) -> Result<()> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(MarketError::InvalidState(format!(
                "milestone {} is {}, cannot move to {target}",
                self.id, self.status
            )))
        }
    }

    /// Moves to `target`, stamping the matching timestamp.
    pub(crate) fn transition_to(&mut self, target: MilestoneStatus, now: DateTime<Utc>) -> Result<()> {
        self.ensure_transition(target)?;
        match target {
            MilestoneStatus::Funded => self.funded_at = Some(now),
            MilestoneStatus::Submitted => self.submitted_at = Some(now),
            MilestoneStatus::Revision => self.revision_count = self.revision_count.saturating_add(1),
            MilestoneStatus::Approved => self.approved_at = Some(now),
            MilestoneStatus::Released => self.released_at = Some(now),
            MilestoneStatus::Pending | MilestoneStatus::InProgress => {}
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Currency;
    use test_case::test_case;
    use MilestoneStatus::{Approved, Funded, InProgress, Pending, Released, Revision, Submitted};

    #[test_case(Pending, Funded, true ; "fund")]
    #[test_case(Funded, InProgress, true ; "start")]
    #[test_case(InProgress, Submitted, true ; "submit")]
    #[test_case(Submitted, Revision, true ; "ask for revision")]
    #[test_case(Revision, Submitted, true ; "resubmit")]
    #[test_case(Submitted, Approved, true ; "approve")]
    #[test_case(Funded, Released, true ; "release funded")]
    #[test_case(Approved, Released, true ; "release approved")]
    #[test_case(Pending, Released, false ; "release unfunded")]
    #[test_case(InProgress, Released, false ; "release in progress")]
    #[test_case(Submitted, Released, false ; "release submitted")]
    #[test_case(Released, Released, false ; "release twice")]
    #[test_case(Released, Funded, false ; "refund after release")]
    fn transition_table(from: MilestoneStatus, to: MilestoneStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn escrow_is_held_between_funding_and_release() {
        assert!(!Pending.holds_escrow());
        assert!(Funded.holds_escrow());
        assert!(Approved.holds_escrow());
        assert!(!Released.holds_escrow());
    }

    #[test]
    fn revision_increments_counter() {
        let mut m = Milestone::new(MilestoneDraft {
            title: "design".to_string(),
            amount: Money::from_major(100, Currency::USD),
            due_at: None,
        })
        .expect("valid");
        let now = Utc::now();
        for target in [Funded, InProgress, Submitted, Revision, Submitted] {
            m.transition_to(target, now).expect("legal");
        }
        assert_eq!(m.revision_count, 1);
        assert_eq!(m.status, Submitted);
    }
}
