//! In-memory store for tests and database-less local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::{CartId, OrderId, PaymentMethodId, ProductId, SessionId};
use domain::{
    AppliedPromo, Cart, CartItem, GuestSession, Order, OrderItem, OrderStatus, Owner,
    PaymentMethod, Product, Promotion,
};

use crate::{
    StoreError,
    error::Result,
    store::{StatusUpdate, StockLine, Store},
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    promotions: Vec<Promotion>,
    promo_usages: Vec<(CartId, String, DateTime<Utc>)>,
    payment_methods: HashMap<PaymentMethodId, PaymentMethod>,
    sessions: HashMap<SessionId, GuestSession>,
    orders: HashMap<OrderId, (Order, Vec<OrderItem>)>,
}

/// In-memory implementation of the [`Store`] trait.
///
/// A single lock guards all state, which keeps the multi-row operations
/// (`commit_checkout`, `cancel_order`, `merge_carts`) atomic without a
/// transaction log.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn add_item(cart: &mut Cart, product_id: ProductId, quantity: u32, now: DateTime<Utc>) {
    match cart.items.iter_mut().find(|i| i.product_id == product_id) {
        Some(item) => item.quantity = item.quantity.saturating_add(quantity),
        None => cart.items.push(CartItem {
            product_id,
            quantity,
            added_at: now,
        }),
    }
    cart.updated_at = now;
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_active_products(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn find_cart(&self, owner: Owner) -> Result<Option<Cart>> {
        let state = self.state.read().await;
        Ok(state.carts.values().find(|c| c.owner == owner).cloned())
    }

    async fn create_cart(&self, cart: &Cart) -> Result<()> {
        let mut state = self.state.write().await;
        state.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn add_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            add_item(cart, product_id, quantity, Utc::now());
        }
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(cart) = state.carts.get_mut(&cart_id) else {
            return Ok(false);
        };
        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                cart.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(cart) = state.carts.get_mut(&cart_id) else {
            return Ok(false);
        };
        let before = cart.items.len();
        cart.items.retain(|i| i.product_id != product_id);
        if cart.items.len() < before {
            cart.updated_at = Utc::now();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.items.clear();
            cart.promo = None;
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_cart_promo(&self, cart_id: CartId, promo: Option<&AppliedPromo>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.promo = promo.cloned();
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_promo_usage(
        &self,
        cart_id: CartId,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.promo_usages.push((cart_id, code.to_string(), used_at));
        Ok(())
    }

    async fn merge_carts(&self, from: CartId, into: CartId) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(source) = state.carts.get(&from).cloned() else {
            return Ok(());
        };
        let now = Utc::now();
        if let Some(target) = state.carts.get_mut(&into) {
            for item in &source.items {
                add_item(target, item.product_id, item.quantity, now);
            }
            target.updated_at = now;
        }
        if let Some(source) = state.carts.get_mut(&from) {
            source.items.clear();
            source.promo = None;
            source.updated_at = now;
        }
        Ok(())
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        let mut state = self.state.write().await;
        state.promotions.push(promotion.clone());
        Ok(())
    }

    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>> {
        let state = self.state.read().await;
        Ok(state
            .promotions
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        let mut state = self.state.write().await;
        state.payment_methods.insert(method.id, method.clone());
        Ok(())
    }

    async fn get_payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        let state = self.state.read().await;
        Ok(state.payment_methods.get(&id).cloned())
    }

    async fn insert_guest_session(&self, session: &GuestSession) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_guest_session(&self, id: SessionId) -> Result<Option<GuestSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn touch_guest_session(&self, id: SessionId, seen_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(&id) {
            session.last_seen_at = seen_at;
        }
        Ok(())
    }

    async fn commit_checkout(
        &self,
        cart_id: CartId,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate every line before touching any quantity, so a short
        // line leaves the whole store unchanged.
        for item in items {
            let product = state
                .products
                .get(&item.product_id)
                .ok_or(StoreError::ProductNotFound(item.product_id))?;
            if product.stock_quantity < item.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: item.product_id,
                    available: product.stock_quantity,
                    requested: item.quantity,
                });
            }
        }

        for item in items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock_quantity -= item.quantity;
                product.updated_at = Utc::now();
            }
        }

        state.orders.insert(order.id, (order.clone(), items.to_vec()));

        // Clear only the lines materialized into the order. A line added
        // concurrently after the cart was read stays in the cart.
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.items
                .retain(|line| !items.iter().any(|i| i.product_id == line.product_id));
            cart.promo = None;
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<(Order, Vec<OrderItem>)>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_orders(&self, owner: Owner) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|(o, _)| o.owner == owner)
            .map(|(o, _)| o.clone())
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let Some((order, _)) = state.orders.get_mut(&id) else {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
            });
        };
        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
            });
        }
        order.status = update.status;
        if let Some(shipped) = update.shipped_date {
            order.shipped_date = Some(shipped);
        }
        if let Some(delivered) = update.delivered_date {
            order.delivered_date = Some(delivered);
        }
        if let Some(payment_method_id) = update.payment_method_id {
            order.payment_method_id = payment_method_id;
        }
        Ok(())
    }

    async fn cancel_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        restore: &[StockLine],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&id) {
            Some((order, _)) if order.status == expected => {
                order.status = OrderStatus::Cancelled;
            }
            _ => {
                return Err(StoreError::StatusConflict {
                    order_id: id,
                    expected,
                });
            }
        }
        for line in restore {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock_quantity += line.quantity;
                product.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
