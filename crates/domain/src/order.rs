//! Order entity and its immutable line items.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentMethodId, ProductId};
use serde::{Deserialize, Serialize};

use crate::owner::Owner;
use crate::promo::AppliedPromo;
use crate::status::OrderStatus;

/// A persisted order.
///
/// Financial fields are snapshotted at checkout: subtotal, discount, tax,
/// and total never change afterwards, even if product prices or the promo
/// definition do. Ownership is frozen at creation. Only `status` and the
/// shipped/delivered stamps are mutated, through the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: Owner,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub subtotal: Money,
    pub discount: Money,
    pub promo: Option<AppliedPromo>,
    pub tax: Money,
    pub tax_rate: f64,
    pub total: Money,
    pub payment_method_id: PaymentMethodId,
    pub order_date: DateTime<Utc>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
}

/// A line item on an order.
///
/// `unit_price` is the product price at time of purchase, copied from the
/// catalog and never recomputed. The product reference is for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns the line total (`quantity * unit_price`).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A selectable payment method.
///
/// Payment is modeled as a method selection only; no gateway is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub is_active: bool,
}
