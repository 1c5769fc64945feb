//! Request dispatch.
//!
//! Every operation is reachable as a tagged JSON request:
//!
//! ```json
//! {"op": "place_bid", "project_id": "…", "terms": {"amount": {"amount": "300.00", "currency": "USD"}, "delivery_days": 7, "proposal": "…"}}
//! ```
//!
//! Responses use a uniform envelope with a success flag, optional data and an
//! optional error carrying an [`ErrorKind`].

use std::collections::BTreeMap;

use bazaar_core::{AccountId, BidId, MilestoneId, Money, OrderId, ProductId, ProjectId, WithdrawalId};
use bazaar_ledger::{Plan, WithdrawalDecision, WithdrawalMethod};
use bazaar_market::{BidTerms, MilestoneDraft, OrderStatus, ProjectDraft, ServicePackage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{EngineError, ErrorKind, Result};
use crate::idempotency::{Admission, Fingerprint};
use crate::marketplace::Marketplace;
use crate::orders::ItemSelection;

/// A marketplace operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Open an account on the default plan.
    OpenAccount {
        /// Name shown to counterparties.
        display_name: String,
    },
    /// Read an account.
    GetAccount {
        /// The account.
        account_id: AccountId,
    },
    /// Move an account to another plan.
    ChangePlan {
        /// The account.
        account_id: AccountId,
        /// New plan.
        plan: Plan,
        /// When the plan lapses.
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Post a project.
    CreateProject {
        /// Project definition.
        project: ProjectDraft,
    },
    /// Read a project.
    GetProject {
        /// The project.
        project_id: ProjectId,
    },
    /// Open a draft for bids.
    PublishProject {
        /// The project.
        project_id: ProjectId,
    },
    /// Cancel a draft or open project.
    CancelProject {
        /// The project.
        project_id: ProjectId,
    },
    /// Delete a project that never received a bid.
    DeleteProject {
        /// The project.
        project_id: ProjectId,
    },
    /// Add a milestone.
    AddMilestone {
        /// The project.
        project_id: ProjectId,
        /// Milestone definition.
        milestone: MilestoneDraft,
    },
    /// Bid on an open project.
    PlaceBid {
        /// The project.
        project_id: ProjectId,
        /// Offer.
        terms: BidTerms,
    },
    /// Change a pending bid.
    EditBid {
        /// The bid.
        bid_id: BidId,
        /// New offer.
        terms: BidTerms,
    },
    /// Withdraw a pending bid.
    WithdrawBid {
        /// The bid.
        bid_id: BidId,
    },
    /// Shortlist a pending bid.
    ShortlistBid {
        /// The bid.
        bid_id: BidId,
    },
    /// List bids on a project.
    ListBids {
        /// The project.
        project_id: ProjectId,
    },
    /// Accept a bid.
    AwardProject {
        /// The project.
        project_id: ProjectId,
        /// The winning bid.
        bid_id: BidId,
    },
    /// Put a milestone amount into escrow.
    FundMilestone {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
        /// Capture reference from the payment gateway.
        payment_reference: String,
    },
    /// Start a funded milestone.
    StartMilestone {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
    },
    /// Hand in a milestone.
    SubmitMilestone {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
    },
    /// Send a milestone back.
    RequestMilestoneRevision {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
    },
    /// Accept a milestone.
    ApproveMilestone {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
    },
    /// Pay a milestone out of escrow.
    ReleaseMilestone {
        /// The project.
        project_id: ProjectId,
        /// The milestone.
        milestone_id: MilestoneId,
    },
    /// Close a project.
    CompleteProject {
        /// The project.
        project_id: ProjectId,
    },
    /// Freeze a project.
    OpenDispute {
        /// The project.
        project_id: ProjectId,
        /// Why.
        reason: String,
    },
    /// Unfreeze a project.
    ResolveDispute {
        /// The project.
        project_id: ProjectId,
        /// Outcome.
        resolution: String,
    },
    /// List a service.
    RegisterService {
        /// Headline.
        title: String,
        /// Price tiers.
        packages: Vec<ServicePackage>,
    },
    /// List a product.
    RegisterProduct {
        /// Headline.
        title: String,
        /// Unit price.
        price: Money,
        /// Initial stock.
        stock: u32,
    },
    /// Add product stock.
    RestockProduct {
        /// The product.
        product_id: ProductId,
        /// Units to add.
        quantity: u32,
    },
    /// Buy a service package or product units.
    PlaceOrder {
        /// What to buy.
        item: ItemSelection,
    },
    /// Read an order.
    GetOrder {
        /// The order.
        order_id: OrderId,
    },
    /// Move an order along the status table.
    UpdateOrderStatus {
        /// The order.
        order_id: OrderId,
        /// Target status.
        status: OrderStatus,
        /// Capture reference, required for `paid`.
        #[serde(default)]
        payment_reference: Option<String>,
        /// Reason, used for `cancelled`.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Hand over an order.
    SubmitDelivery {
        /// The order.
        order_id: OrderId,
        /// Delivery note.
        message: String,
        /// Attachment URLs.
        #[serde(default)]
        attachments: Vec<String>,
    },
    /// Ask for changes to a delivered order.
    RequestRevision {
        /// The order.
        order_id: OrderId,
        /// What to change.
        message: String,
    },
    /// Accept a delivered order.
    CompleteOrder {
        /// The order.
        order_id: OrderId,
    },
    /// Call off a pending or paid order.
    CancelOrder {
        /// The order.
        order_id: OrderId,
        /// Why.
        #[serde(default)]
        reason: String,
    },
    /// Request a payout.
    RequestWithdrawal {
        /// The account to withdraw from.
        account_id: AccountId,
        /// Amount to withdraw.
        amount: Money,
        /// Payout rail.
        method: WithdrawalMethod,
        /// Rail-specific details.
        #[serde(default)]
        details: BTreeMap<String, String>,
    },
    /// Mark a withdrawal as being paid out.
    BeginWithdrawal {
        /// The account.
        account_id: AccountId,
        /// The request.
        withdrawal_id: WithdrawalId,
    },
    /// Complete or reject a withdrawal.
    ResolveWithdrawal {
        /// The account.
        account_id: AccountId,
        /// The request.
        withdrawal_id: WithdrawalId,
        /// The decision.
        decision: WithdrawalDecision,
    },
}

impl Request {
    /// Returns true for operations that change state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::GetAccount { .. }
                | Self::GetProject { .. }
                | Self::ListBids { .. }
                | Self::GetOrder { .. }
        )
    }
}

/// Error half of an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable category.
    pub kind: ErrorKind,
    /// Human-readable detail; generic for internal errors.
    pub message: String,
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    /// A successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response for `err`.
    #[must_use]
    pub fn failure(err: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: err.kind(),
                message: err.public_message(),
            }),
        }
    }

    /// The error category, if this is a failure.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|data| serde_json::to_value(data).map_err(EngineError::from)) {
            Ok(value) => Self::ok(value),
            Err(e) => {
                if e.kind() == ErrorKind::Internal {
                    error!(error = %e, "request failed");
                } else {
                    debug!(error = %e, kind = %e.kind(), "request rejected");
                }
                Self::failure(&e)
            }
        }
    }
}

impl Marketplace {
    /// Runs `request` on behalf of `actor`.
    ///
    /// With an idempotency key, a retry carrying the same actor and payload
    /// returns the first response without running again. Internal failures
    /// are not remembered, so they can be retried.
    pub fn dispatch(
        &self,
        actor: AccountId,
        request: Request,
        idempotency_key: Option<&str>,
    ) -> ApiResponse {
        let Some(key) = idempotency_key else {
            return self.route(actor, request);
        };

        let fingerprint = match Fingerprint::of(&(actor, &request)) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return ApiResponse::from_result::<()>(Err(e)),
        };
        match self.idempotency.begin(key, fingerprint) {
            Admission::Fresh => {}
            Admission::Replay(response) => {
                debug!(idempotency_key = key, "replayed response");
                return response;
            }
            Admission::Conflict(reason) => {
                warn!(idempotency_key = key, reason, "idempotency conflict");
                return ApiResponse::failure(&EngineError::InvalidState(reason.to_string()));
            }
        }

        let response = self.route(actor, request);
        if response.error_kind() == Some(ErrorKind::Internal) {
            self.idempotency.abandon(key);
        } else {
            self.idempotency.finish(key, fingerprint, response.clone());
        }
        response
    }

    fn route(&self, actor: AccountId, request: Request) -> ApiResponse {
        match request {
            Request::OpenAccount { display_name } => {
                ApiResponse::from_result(self.open_account(display_name))
            }
            Request::GetAccount { account_id } => {
                ApiResponse::from_result(self.get_account(actor, account_id))
            }
            Request::ChangePlan {
                account_id,
                plan,
                expires_at,
            } => ApiResponse::from_result(self.change_plan(actor, account_id, plan, expires_at)),
            Request::CreateProject { project } => {
                ApiResponse::from_result(self.create_project(actor, project))
            }
            Request::GetProject { project_id } => {
                ApiResponse::from_result(self.get_project(actor, project_id))
            }
            Request::PublishProject { project_id } => {
                ApiResponse::from_result(self.publish_project(actor, project_id))
            }
            Request::CancelProject { project_id } => {
                ApiResponse::from_result(self.cancel_project(actor, project_id))
            }
            Request::DeleteProject { project_id } => {
                ApiResponse::from_result(self.delete_project(actor, project_id))
            }
            Request::AddMilestone {
                project_id,
                milestone,
            } => ApiResponse::from_result(self.add_milestone(actor, project_id, milestone)),
            Request::PlaceBid { project_id, terms } => {
                ApiResponse::from_result(self.place_bid(actor, project_id, terms))
            }
            Request::EditBid { bid_id, terms } => {
                ApiResponse::from_result(self.edit_bid(actor, bid_id, terms))
            }
            Request::WithdrawBid { bid_id } => {
                ApiResponse::from_result(self.withdraw_bid(actor, bid_id))
            }
            Request::ShortlistBid { bid_id } => {
                ApiResponse::from_result(self.shortlist_bid(actor, bid_id))
            }
            Request::ListBids { project_id } => {
                ApiResponse::from_result(self.list_bids(actor, project_id))
            }
            Request::AwardProject { project_id, bid_id } => {
                ApiResponse::from_result(self.award_project(actor, project_id, bid_id))
            }
            Request::FundMilestone {
                project_id,
                milestone_id,
                payment_reference,
            } => ApiResponse::from_result(self.fund_milestone(
                actor,
                project_id,
                milestone_id,
                payment_reference,
            )),
            Request::StartMilestone {
                project_id,
                milestone_id,
            } => ApiResponse::from_result(self.start_milestone(actor, project_id, milestone_id)),
            Request::SubmitMilestone {
                project_id,
                milestone_id,
            } => ApiResponse::from_result(self.submit_milestone(actor, project_id, milestone_id)),
            Request::RequestMilestoneRevision {
                project_id,
                milestone_id,
            } => ApiResponse::from_result(self.request_milestone_revision(
                actor,
                project_id,
                milestone_id,
            )),
            Request::ApproveMilestone {
                project_id,
                milestone_id,
            } => ApiResponse::from_result(self.approve_milestone(actor, project_id, milestone_id)),
            Request::ReleaseMilestone {
                project_id,
                milestone_id,
            } => ApiResponse::from_result(self.release_milestone(actor, project_id, milestone_id)),
            Request::CompleteProject { project_id } => {
                ApiResponse::from_result(self.complete_project(actor, project_id))
            }
            Request::OpenDispute { project_id, reason } => {
                ApiResponse::from_result(self.open_dispute(actor, project_id, reason))
            }
            Request::ResolveDispute {
                project_id,
                resolution,
            } => ApiResponse::from_result(self.resolve_dispute(actor, project_id, resolution)),
            Request::RegisterService { title, packages } => {
                ApiResponse::from_result(self.register_service(actor, title, packages))
            }
            Request::RegisterProduct {
                title,
                price,
                stock,
            } => ApiResponse::from_result(self.register_product(actor, title, price, stock)),
            Request::RestockProduct {
                product_id,
                quantity,
            } => ApiResponse::from_result(self.restock_product(actor, product_id, quantity)),
            Request::PlaceOrder { item } => ApiResponse::from_result(self.place_order(actor, item)),
            Request::GetOrder { order_id } => {
                ApiResponse::from_result(self.get_order(actor, order_id))
            }
            Request::UpdateOrderStatus {
                order_id,
                status,
                payment_reference,
                reason,
            } => ApiResponse::from_result(self.update_order_status(
                actor,
                order_id,
                status,
                payment_reference,
                reason,
            )),
            Request::SubmitDelivery {
                order_id,
                message,
                attachments,
            } => ApiResponse::from_result(self.submit_delivery(actor, order_id, message, attachments)),
            Request::RequestRevision { order_id, message } => {
                ApiResponse::from_result(self.request_revision(actor, order_id, message))
            }
            Request::CompleteOrder { order_id } => {
                ApiResponse::from_result(self.complete_order(actor, order_id))
            }
            Request::CancelOrder { order_id, reason } => {
                ApiResponse::from_result(self.cancel_order(actor, order_id, reason))
            }
            Request::RequestWithdrawal {
                account_id,
                amount,
                method,
                details,
            } => ApiResponse::from_result(self.request_withdrawal(
                actor, account_id, amount, method, details,
            )),
            Request::BeginWithdrawal {
                account_id,
                withdrawal_id,
            } => ApiResponse::from_result(self.begin_withdrawal(actor, account_id, withdrawal_id)),
            Request::ResolveWithdrawal {
                account_id,
                withdrawal_id,
                decision,
            } => ApiResponse::from_result(self.resolve_withdrawal(
                actor,
                account_id,
                withdrawal_id,
                decision,
            )),
        }
    }
}
