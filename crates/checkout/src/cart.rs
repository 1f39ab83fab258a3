//! Cart operations: line management, promos, and the derived view.

use std::sync::Arc;

use chrono::Utc;
use common::{Money, ProductId, SessionId, UserId};
use domain::{AppliedPromo, Cart, Owner};
use serde::Serialize;
use store::Store;

use crate::{
    error::{CheckoutError, Result},
    pricing::{PricingConfig, Totals},
};

/// A cart line enriched with current catalog data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// The cart as presented to shoppers.
///
/// All amounts are derived on read from current product prices; nothing
/// here is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: common::CartId,
    pub items: Vec<CartLine>,
    pub promo: Option<AppliedPromo>,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Cart service: resolution, line mutations, promo handling.
pub struct CartService<S> {
    store: Arc<S>,
    pricing: PricingConfig,
}

impl<S: Store> CartService<S> {
    pub fn new(store: Arc<S>, pricing: PricingConfig) -> Self {
        Self { store, pricing }
    }

    /// Resolves the acting cart owner from the request identity.
    ///
    /// When both a user id and a guest session are present, the guest
    /// cart's lines are merged into the user cart first (one-way,
    /// quantities add, the guest promo is discarded) and the user owns
    /// the cart from then on.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_owner(
        &self,
        user_id: Option<UserId>,
        session_id: Option<SessionId>,
    ) -> Result<Owner> {
        match (user_id, session_id) {
            (Some(user_id), Some(session_id)) => {
                self.merge_guest_cart(session_id, user_id).await?;
                Ok(Owner::User(user_id))
            }
            (Some(user_id), None) => Ok(Owner::User(user_id)),
            (None, Some(session_id)) => Ok(Owner::Guest(session_id)),
            (None, None) => Err(CheckoutError::Validation(
                "request carries no shopper identity".to_string(),
            )),
        }
    }

    /// Lists active catalog products.
    pub async fn list_products(&self) -> Result<Vec<domain::Product>> {
        Ok(self.store.list_active_products().await?)
    }

    /// Loads a catalog product.
    pub async fn get_product(&self, product_id: ProductId) -> Result<domain::Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("Product not found: {product_id}")))
    }

    /// Loads the owner's cart, creating an empty one on first access.
    pub async fn get_or_create(&self, owner: Owner) -> Result<Cart> {
        if let Some(cart) = self.store.find_cart(owner).await? {
            return Ok(cart);
        }
        let cart = Cart::new(owner, Utc::now());
        self.store.create_cart(&cart).await?;
        Ok(cart)
    }

    async fn merge_guest_cart(&self, session_id: SessionId, user_id: UserId) -> Result<()> {
        let Some(guest) = self.store.find_cart(Owner::Guest(session_id)).await? else {
            return Ok(());
        };
        if guest.is_empty() {
            return Ok(());
        }
        let user_cart = self.get_or_create(Owner::User(user_id)).await?;
        tracing::info!(
            from = %guest.id,
            into = %user_cart.id,
            lines = guest.items.len(),
            "merging guest cart into user cart"
        );
        self.store.merge_carts(guest.id, user_cart.id).await?;
        Ok(())
    }

    /// Adds `quantity` of a product, incrementing an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: Owner,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        let quantity = positive_quantity(quantity)?;
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CheckoutError::NotFound(format!("Product not found: {product_id}")))?;

        let cart = self.get_or_create(owner).await?;
        self.store
            .add_cart_item(cart.id, product.id, quantity)
            .await?;
        self.view(owner).await
    }

    /// Sets a line's quantity. Zero removes the line; negative is
    /// rejected.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        owner: Owner,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        if quantity < 0 {
            return Err(CheckoutError::Validation(
                "quantity must not be negative".to_string(),
            ));
        }
        let cart = self.get_or_create(owner).await?;

        let found = if quantity == 0 {
            self.store.remove_cart_item(cart.id, product_id).await?
        } else {
            let quantity = positive_quantity(quantity)?;
            self.store
                .set_cart_item_quantity(cart.id, product_id, quantity)
                .await?
        };
        if !found {
            return Err(CheckoutError::NotFound(format!(
                "No cart line for product {product_id}"
            )));
        }
        self.view(owner).await
    }

    /// Removes a line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, owner: Owner, product_id: ProductId) -> Result<CartView> {
        let cart = self.get_or_create(owner).await?;
        if !self.store.remove_cart_item(cart.id, product_id).await? {
            return Err(CheckoutError::NotFound(format!(
                "No cart line for product {product_id}"
            )));
        }
        self.view(owner).await
    }

    /// Empties the cart and drops its promo.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner: Owner) -> Result<CartView> {
        let cart = self.get_or_create(owner).await?;
        self.store.clear_cart(cart.id).await?;
        self.view(owner).await
    }

    /// Applies a promo code to the cart.
    ///
    /// The definition is validated now and frozen onto the cart as a
    /// snapshot; the discount amount is recomputed at every read and
    /// again at checkout.
    #[tracing::instrument(skip(self))]
    pub async fn apply_promo(&self, owner: Owner, code: &str) -> Result<CartView> {
        let cart = self.get_or_create(owner).await?;
        if cart.promo.is_some() {
            return Err(CheckoutError::Conflict(
                "a promo code is already applied".to_string(),
            ));
        }
        let promotion = self
            .store
            .find_promotion(code)
            .await?
            .ok_or_else(|| CheckoutError::InvalidPromo(code.to_string()))?;

        let now = Utc::now();
        let applied = promotion.validate(now)?;
        self.store.set_cart_promo(cart.id, Some(&applied)).await?;
        self.store
            .record_promo_usage(cart.id, &applied.code, now)
            .await?;
        metrics::counter!("cart_promo_applied_total").increment(1);
        self.view(owner).await
    }

    /// Removes the applied promo.
    #[tracing::instrument(skip(self))]
    pub async fn remove_promo(&self, owner: Owner) -> Result<CartView> {
        let cart = self.get_or_create(owner).await?;
        if cart.promo.is_none() {
            return Err(CheckoutError::Validation(
                "no promo code is applied".to_string(),
            ));
        }
        self.store.set_cart_promo(cart.id, None).await?;
        self.view(owner).await
    }

    /// Builds the derived cart view from current product prices.
    pub async fn view(&self, owner: Owner) -> Result<CartView> {
        let cart = self.get_or_create(owner).await?;

        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self.store.get_product(item.product_id).await?.ok_or_else(|| {
                CheckoutError::NotFound(format!("Product not found: {}", item.product_id))
            })?;
            lines.push(CartLine {
                product_id: product.id,
                product_name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                line_total: product.price.multiply(item.quantity),
            });
        }

        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        let totals = self.pricing.price(subtotal, cart.promo.as_ref());

        Ok(CartView {
            cart_id: cart.id,
            items: lines,
            promo: cart.promo,
            totals,
        })
    }
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(CheckoutError::Validation(
            "quantity must be positive".to_string(),
        ));
    }
    u32::try_from(quantity)
        .map_err(|_| CheckoutError::Validation("quantity is too large".to_string()))
}
