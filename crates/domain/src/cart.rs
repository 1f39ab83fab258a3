//! Shopping cart entity.

use chrono::{DateTime, Utc};
use common::{CartId, ProductId};
use serde::{Deserialize, Serialize};

use crate::owner::Owner;
use crate::promo::AppliedPromo;

/// A line item in a cart.
///
/// At most one line exists per `(cart, product)` pair; adding an
/// already-present product increments its quantity instead. Quantity is
/// always positive: an update to zero removes the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// A shopping cart with its line items and optional promo snapshot.
///
/// Created lazily on first access and kept (empty) after checkout for
/// reuse. Monetary totals are never stored here; they are derived on read
/// from current product prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: Owner,
    pub promo: Option<AppliedPromo>,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for `owner`.
    pub fn new(owner: Owner, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            owner,
            promo: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the line item for `product_id`, if present.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Returns true if the cart has no line items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
