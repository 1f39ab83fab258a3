//! Checkout orchestration.
//!
//! Pricing is recomputed from the catalog at the moment of checkout and
//! snapshotted onto the order. Stock reservation, order insertion, and
//! cart clearing run as a single store transaction, so a failure at any
//! point leaves stock, cart, and orders untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{Money, PaymentMethodId};
use domain::{Order, OrderItem, OrderStatus, Owner};
use store::Store;

use crate::{
    error::{CheckoutError, Result},
    pricing::PricingConfig,
};

/// Input to [`CheckoutService::checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method_id: PaymentMethodId,
}

/// Turns a cart into an order.
pub struct CheckoutService<S> {
    store: Arc<S>,
    pricing: PricingConfig,
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: Arc<S>, pricing: PricingConfig) -> Self {
        Self { store, pricing }
    }

    /// Places an order from the owner's cart.
    ///
    /// Unit prices are read from the catalog now, not from when lines
    /// were added. The applied promo's discount is likewise recomputed
    /// against the fresh subtotal.
    #[tracing::instrument(skip(self, request), fields(owner = %owner))]
    pub async fn checkout(
        &self,
        owner: Owner,
        request: CheckoutRequest,
    ) -> Result<(Order, Vec<OrderItem>)> {
        let start = Instant::now();
        let result = self.place_order(owner, request).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("checkout_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok((order, _)) => {
                tracing::info!(order_id = %order.id, total = %order.total, "order placed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkout failed");
            }
        }
        result
    }

    async fn place_order(
        &self,
        owner: Owner,
        request: CheckoutRequest,
    ) -> Result<(Order, Vec<OrderItem>)> {
        if request.shipping_address.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "shipping address must not be blank".to_string(),
            ));
        }

        let cart = self
            .store
            .find_cart(owner)
            .await?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CheckoutError::Validation("cart is empty".to_string()))?;

        self.store
            .get_payment_method(request.payment_method_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                CheckoutError::NotFound(format!(
                    "Payment method not found: {}",
                    request.payment_method_id
                ))
            })?;

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self.store.get_product(line.product_id).await?.ok_or_else(|| {
                CheckoutError::NotFound(format!("Product not found: {}", line.product_id))
            })?;
            items.push(OrderItem {
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let subtotal: Money = items.iter().map(|i| i.line_total()).sum();
        let totals = self.pricing.price(subtotal, cart.promo.as_ref());

        let order = Order {
            id: common::OrderId::new(),
            owner,
            status: OrderStatus::Pending,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            subtotal: totals.subtotal,
            discount: totals.discount,
            promo: cart.promo.clone(),
            tax: totals.tax,
            tax_rate: self.pricing.tax_rate,
            total: totals.total,
            payment_method_id: request.payment_method_id,
            order_date: Utc::now(),
            shipped_date: None,
            delivered_date: None,
        };

        self.store.commit_checkout(cart.id, &order, &items).await?;
        Ok((order, items))
    }
}
