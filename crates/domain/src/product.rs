//! Catalog product entity.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A catalog product.
///
/// `stock_quantity` is mutated only through the store's stock operations
/// (guarded decrement at checkout, unguarded restore on cancellation),
/// never assigned directly by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Purchase cost, visible to administrators only.
    pub cost: Option<Money>,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns true if at least `quantity` units are in stock.
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}
