//! Engine configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file yields a
//! working USD marketplace with four membership tiers:
//!
//! ```toml
//! currency = "USD"
//! minimum_withdrawal = "50.00"
//! default_plan = "free"
//! administrators = ["6f1c0f9e-3c1d-4a53-9a55-1f0d2c6b8e01"]
//! snapshot_path = "/var/lib/bazaar/state.json"
//!
//! [idempotency]
//! capacity = 10000
//! ttl_secs = 300
//!
//! [[tiers]]
//! plan = "free"
//! fee_rate = 1000      # basis points
//! bids_per_cycle = 10  # -1 for unlimited
//! cycle_days = 30
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bazaar_core::{AccountId, Amount, Currency, FeeRate, Money};
use bazaar_ledger::{BidAllowance, Plan, TierTerms};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Request deduplication settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Maximum number of remembered keys.
    pub capacity: usize,
    /// How long a key is remembered, in seconds.
    pub ttl_secs: u64,
}

impl IdempotencyConfig {
    /// Returns the TTL as a duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: 300,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Platform currency; every amount must be denominated in it.
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Smallest amount that may be withdrawn.
    #[serde(default = "default_minimum_withdrawal")]
    pub minimum_withdrawal: Amount,
    /// Plan new accounts start on and lapsed plans fall back to.
    #[serde(default)]
    pub default_plan: Plan,
    /// Accounts the static identity provider treats as administrators.
    #[serde(default)]
    pub administrators: Vec<AccountId>,
    /// Where the CLI writes state snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    /// Request deduplication.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Terms of each membership plan.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierTerms>,
}

fn default_currency() -> Currency {
    Currency::USD
}

const fn default_minimum_withdrawal() -> Amount {
    Amount::from_major(50)
}

fn bps(value: u32) -> FeeRate {
    match FeeRate::from_bps(value) {
        Ok(rate) => rate,
        Err(_) => FeeRate::ZERO,
    }
}

fn default_tiers() -> Vec<TierTerms> {
    vec![
        TierTerms {
            plan: Plan::Free,
            fee_rate: bps(1_000),
            bids_per_cycle: BidAllowance::Limited(10),
            cycle_days: 30,
        },
        TierTerms {
            plan: Plan::Starter,
            fee_rate: bps(800),
            bids_per_cycle: BidAllowance::Limited(30),
            cycle_days: 30,
        },
        TierTerms {
            plan: Plan::Professional,
            fee_rate: bps(500),
            bids_per_cycle: BidAllowance::Limited(100),
            cycle_days: 30,
        },
        TierTerms {
            plan: Plan::Enterprise,
            fee_rate: bps(300),
            bids_per_cycle: BidAllowance::Unlimited,
            cycle_days: 30,
        },
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            minimum_withdrawal: default_minimum_withdrawal(),
            default_plan: Plan::default(),
            administrators: Vec::new(),
            snapshot_path: None,
            idempotency: IdempotencyConfig::default(),
            tiers: default_tiers(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(format!("cannot render TOML: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(EngineError::Config("at least one tier is required".to_string()));
        }

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.plan) {
                return Err(EngineError::Config(format!(
                    "plan {} is configured twice",
                    tier.plan
                )));
            }
            if tier.cycle_days == 0 {
                return Err(EngineError::Config(format!(
                    "tiers.{}.cycle_days must be greater than 0",
                    tier.plan
                )));
            }
        }

        if self.tier(self.default_plan).is_none() {
            return Err(EngineError::Config(format!(
                "default plan {} has no tier",
                self.default_plan
            )));
        }

        if self.idempotency.capacity == 0 {
            return Err(EngineError::Config(
                "idempotency.capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Terms of `plan`, if configured.
    #[must_use]
    pub fn tier(&self, plan: Plan) -> Option<&TierTerms> {
        self.tiers.iter().find(|t| t.plan == plan)
    }

    /// Terms of the default plan.
    pub fn default_terms(&self) -> Result<&TierTerms> {
        self.tier(self.default_plan)
            .ok_or_else(|| EngineError::Config(format!("default plan {} has no tier", self.default_plan)))
    }

    /// Minimum withdrawal in the platform currency.
    #[must_use]
    pub const fn minimum_withdrawal(&self) -> Money {
        Money::new(self.minimum_withdrawal, self.currency)
    }
}
