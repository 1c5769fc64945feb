//! Account and membership operations.

use bazaar_core::AccountId;
use bazaar_ledger::{Account, Plan};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::marketplace::{require_admin, Marketplace};

impl Marketplace {
    // ==================== Account Operations ====================

    /// Opens an account on the default plan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidState`] if the display name is blank.
    pub fn open_account(&self, display_name: impl Into<String>) -> Result<Account> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(EngineError::InvalidState(
                "display name must not be empty".to_string(),
            ));
        }

        let account = Account::new(
            display_name,
            self.config.currency,
            &self.default_terms,
            self.now(),
        );
        self.store.accounts.insert(account.id, account.clone());

        info!(
            account_id = %account.id,
            plan = %account.membership.plan,
            "opened account"
        );
        Ok(account)
    }

    /// Reads an account. Holder or administrator.
    ///
    /// Lapsed plans and due quota recharges are applied first.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist or belongs to someone else.
    pub fn get_account(&self, actor: AccountId, account_id: AccountId) -> Result<Account> {
        let actor = self.actor(actor)?;
        if actor.account_id != account_id {
            require_admin(&actor, "read another account")?;
        }

        let handle = self.account_handle(account_id)?;
        let mut account = handle.lock();
        self.refresh(&mut account, self.now());
        Ok(account.clone())
    }

    /// Moves an account to `plan`. Administrator only.
    ///
    /// The allowance restarts at the plan's full quota. A plan with an
    /// `expires_at` falls back to the default plan once that time passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an administrator, the plan is not
    /// offered, or the account does not exist.
    pub fn change_plan(
        &self,
        actor: AccountId,
        account_id: AccountId,
        plan: Plan,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account> {
        let actor = self.actor(actor)?;
        require_admin(&actor, "change a membership plan")?;
        let terms = *self
            .config
            .tier(plan)
            .ok_or_else(|| EngineError::InvalidState(format!("plan {plan} is not offered")))?;
        let now = self.now();
        if expires_at.is_some_and(|at| at <= now) {
            return Err(EngineError::InvalidState(
                "plan expiry must be in the future".to_string(),
            ));
        }

        let handle = self.account_handle(account_id)?;
        let mut account = handle.lock();
        account.membership.change_plan(&terms, now, expires_at);
        account.updated_at = now;

        info!(
            account_id = %account_id,
            plan = %plan,
            fee_rate = %terms.fee_rate,
            changed_by = %actor.account_id,
            "changed membership plan"
        );
        Ok(account.clone())
    }
}
