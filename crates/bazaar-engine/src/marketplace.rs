//! The marketplace facade and its collaborators.

use std::fmt;
use std::sync::Arc;

use bazaar_core::{AccountId, Actor, Money, OrderId, ProductId, ProjectId, Role, ServiceId};
use bazaar_ledger::{Account, TierTerms};
use bazaar_market::{Order, Product, ProjectRecord, Service};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::ApiResponse;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::idempotency::IdempotencyCache;
use crate::identity::{Clock, IdentityProvider, StaticIdentityProvider, SystemClock};
use crate::notify::{MarketEvent, NotificationSink, TracingNotificationSink};
use crate::payment::{AlwaysCaptured, PaymentAuthority};
use crate::store::{MarketState, Shared, Store};

/// The transaction and ledger engine.
///
/// All operations take the acting account's ID, resolve its role through the
/// [`IdentityProvider`] and lock only the documents they touch.
pub struct Marketplace {
    pub(crate) config: EngineConfig,
    pub(crate) default_terms: TierTerms,
    pub(crate) store: Store,
    identity: Arc<dyn IdentityProvider>,
    pub(crate) payments: Arc<dyn PaymentAuthority>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    pub(crate) idempotency: IdempotencyCache<ApiResponse>,
}

impl fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marketplace")
            .field("currency", &self.config.currency)
            .field("accounts", &self.store.accounts.len())
            .field("projects", &self.store.projects.len())
            .field("orders", &self.store.orders.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn require_admin(actor: &Actor, action: &'static str) -> Result<()> {
    if actor.role == Role::Administrator {
        Ok(())
    } else {
        Err(EngineError::AdministratorRequired(action))
    }
}

/// Builder for [`Marketplace`].
pub struct MarketplaceBuilder {
    config: EngineConfig,
    state: MarketState,
    identity: Option<Arc<dyn IdentityProvider>>,
    payments: Option<Arc<dyn PaymentAuthority>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MarketplaceBuilder {
    /// Starts a builder from `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: MarketState::default(),
            identity: None,
            payments: None,
            notifier: None,
            clock: None,
        }
    }

    /// Restores previously exported state.
    #[must_use]
    pub fn with_state(mut self, state: MarketState) -> Self {
        self.state = state;
        self
    }

    /// Sets the identity provider. Defaults to the configured administrators.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the payment authority. Defaults to [`AlwaysCaptured`].
    #[must_use]
    pub fn with_payments(mut self, payments: Arc<dyn PaymentAuthority>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Sets the notification sink. Defaults to [`TracingNotificationSink`].
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<Marketplace> {
        self.config.validate()?;
        let default_terms = *self.config.default_terms()?;
        let identity = self.identity.unwrap_or_else(|| {
            Arc::new(StaticIdentityProvider::new(
                self.config.administrators.iter().copied(),
            ))
        });
        let accounts = self.state.accounts.len();
        let projects = self.state.projects.len();
        let orders = self.state.orders.len();

        let market = Marketplace {
            idempotency: IdempotencyCache::new(self.config.idempotency),
            store: Store::from_state(self.state),
            default_terms,
            identity,
            payments: self.payments.unwrap_or_else(|| Arc::new(AlwaysCaptured)),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(TracingNotificationSink)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
        };
        info!(
            currency = %market.config.currency,
            accounts,
            projects,
            orders,
            "marketplace ready"
        );
        Ok(market)
    }
}

impl Marketplace {
    /// Starts a [`MarketplaceBuilder`].
    #[must_use]
    pub fn builder(config: EngineConfig) -> MarketplaceBuilder {
        MarketplaceBuilder::new(config)
    }

    /// Builds an empty marketplace with default collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self> {
        MarketplaceBuilder::new(config).build()
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Copies every document for persistence.
    #[must_use]
    pub fn export_state(&self) -> MarketState {
        self.store.to_state()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolves the acting account.
    /// Resolves `id` to an actor. Members must hold an account; administrators
    /// are recognized by the identity provider alone.
    pub(crate) fn actor(&self, id: AccountId) -> Result<Actor> {
        let role = self
            .identity
            .role_of(&id)
            .ok_or(EngineError::UnknownActor(id))?;
        if role == Role::Member && !self.store.accounts.contains(&id) {
            return Err(EngineError::UnknownActor(id));
        }
        Ok(Actor {
            account_id: id,
            role,
        })
    }

    pub(crate) fn ensure_platform_currency(&self, money: &Money, what: &str) -> Result<()> {
        if money.currency == self.config.currency {
            Ok(())
        } else {
            Err(EngineError::InvalidAmount(format!(
                "{what} is in {}, the platform settles in {}",
                money.currency, self.config.currency
            )))
        }
    }

    /// Applies lazy membership expiry and quota recharge.
    pub(crate) fn refresh(&self, account: &mut Account, now: DateTime<Utc>) {
        let outcome = account.refresh_membership(now, &self.default_terms);
        if outcome.expired {
            info!(account_id = %account.id, plan = %account.membership.plan, "membership lapsed");
        }
        if outcome.recharged {
            debug!(account_id = %account.id, bids = %account.membership.bids_remaining, "bid allowance recharged");
        }
    }

    /// Delivers an event. Call only after every document lock is released.
    pub(crate) fn emit(&self, event: &MarketEvent) {
        if let Err(e) = self.notifier.notify(event) {
            warn!(event = event.name(), error = %e, "notification dropped");
        }
    }

    // ==================== Document Handles ====================

    pub(crate) fn account_handle(&self, id: AccountId) -> Result<Shared<Account>> {
        self.store
            .accounts
            .get(&id)
            .ok_or_else(|| EngineError::not_found("account", id))
    }

    pub(crate) fn project_handle(&self, id: ProjectId) -> Result<Shared<ProjectRecord>> {
        self.store
            .projects
            .get(&id)
            .ok_or_else(|| EngineError::not_found("project", id))
    }

    pub(crate) fn order_handle(&self, id: OrderId) -> Result<Shared<Order>> {
        self.store
            .orders
            .get(&id)
            .ok_or_else(|| EngineError::not_found("order", id))
    }

    pub(crate) fn service_handle(&self, id: ServiceId) -> Result<Shared<Service>> {
        self.store
            .services
            .get(&id)
            .ok_or_else(|| EngineError::not_found("service", id))
    }

    pub(crate) fn product_handle(&self, id: ProductId) -> Result<Shared<Product>> {
        self.store
            .products
            .get(&id)
            .ok_or_else(|| EngineError::not_found("product", id))
    }
}
