//! Sellable catalog items: package-priced services and stocked products.
//!
//! Listing, search and categorisation live outside the engine; only the
//! fields an order reads or updates are modelled here.

use bazaar_core::{AccountId, Capability, CapabilitySet, Money, ProductId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require, MarketError, Result};

/// One price tier of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePackage {
    /// Tier name, unique within the service (e.g. "basic").
    pub name: String,
    /// Price of the tier.
    pub price: Money,
    /// Promised delivery time in days.
    pub delivery_days: u32,
    /// Revision rounds the buyer may request.
    pub revisions_included: u32,
}

/// A package-priced gig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Unique service ID.
    pub id: ServiceId,
    /// Offering seller.
    pub seller_id: AccountId,
    /// Headline.
    pub title: String,
    /// Price tiers.
    pub packages: Vec<ServicePackage>,
    /// Orders completed for this service.
    pub completed_orders: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Service {
    /// Creates a service after validating its packages.
    pub fn new(
        seller_id: AccountId,
        title: String,
        packages: Vec<ServicePackage>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let Some(first) = packages.first() else {
            return Err(MarketError::InvalidState(
                "a service needs at least one package".to_string(),
            ));
        };
        let currency = first.price.currency;
        for (i, package) in packages.iter().enumerate() {
            if package.price.is_zero() || package.price.currency != currency {
                return Err(MarketError::InvalidAmount(format!(
                    "package {} must have a positive price in {currency}",
                    package.name
                )));
            }
            if packages[..i].iter().any(|p| p.name == package.name) {
                return Err(MarketError::InvalidState(format!(
                    "duplicate package name {}",
                    package.name
                )));
            }
        }
        Ok(Self {
            id: ServiceId::new(),
            seller_id,
            title,
            packages,
            completed_orders: 0,
            created_at: now,
        })
    }

    /// Looks up a package by name.
    pub fn package(&self, name: &str) -> Result<&ServicePackage> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| MarketError::NotFound(format!("package {name} of service {}", self.id)))
    }

    /// Counts a completed order.
    pub fn record_completion(&mut self) {
        self.completed_orders = self.completed_orders.saturating_add(1);
    }
}

/// An inventory-backed good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Offering seller.
    pub seller_id: AccountId,
    /// Headline.
    pub title: String,
    /// Unit price.
    pub price: Money,
    /// Units available for new orders.
    pub stock: u32,
    /// Units sold through completed orders.
    pub sold: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product.
    pub fn new(
        seller_id: AccountId,
        title: String,
        price: Money,
        stock: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if price.is_zero() {
            return Err(MarketError::InvalidAmount(
                "product price must be positive".to_string(),
            ));
        }
        Ok(Self {
            id: ProductId::new(),
            seller_id,
            title,
            price,
            stock,
            sold: 0,
            created_at: now,
        })
    }

    /// Takes `quantity` units out of stock for a new order.
    pub fn reserve(&mut self, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(MarketError::InvalidAmount("quantity must be positive".to_string()));
        }
        let remaining = self
            .stock
            .checked_sub(quantity)
            .ok_or(MarketError::InsufficientStock {
                product: self.id,
                requested: quantity,
                available: self.stock,
            })?;
        self.stock = remaining;
        Ok(())
    }

    /// Puts units from a cancelled order back into stock.
    pub fn release(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
    }

    /// Adds stock. Seller only.
    pub fn restock(&mut self, caps: CapabilitySet, quantity: u32) -> Result<u32> {
        require(caps, &[Capability::Owner], "restock a product")?;
        self.stock = self.stock.checked_add(quantity).ok_or_else(|| {
            MarketError::InvalidAmount(format!("stock overflow for product {}", self.id))
        })?;
        Ok(self.stock)
    }

    /// Counts units sold through a completed order.
    pub fn record_sale(&mut self, quantity: u32) {
        self.sold = self.sold.saturating_add(u64::from(quantity));
    }
}
