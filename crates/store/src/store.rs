//! The storefront persistence trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId, PaymentMethodId, ProductId, SessionId};
use domain::{
    AppliedPromo, Cart, GuestSession, Order, OrderItem, OrderStatus, Owner, PaymentMethod,
    Product, Promotion,
};

use crate::error::Result;

/// A stock movement against a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A compare-and-set order status update.
///
/// Date stamps and the payment method are only written when set; `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub payment_method_id: Option<PaymentMethodId>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Transactional access to the storefront's relational state.
///
/// Methods that touch multiple rows (`commit_checkout`, `cancel_order`,
/// `merge_carts`) are atomic: they either apply fully or leave the store
/// unchanged. Stock guards live here, in the data store, so that multiple
/// service instances cannot jointly overcommit.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Products --

    /// Inserts a catalog product.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Loads a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists active catalog products.
    async fn list_active_products(&self) -> Result<Vec<Product>>;

    // -- Carts --

    /// Finds the cart owned by `owner`, with its line items.
    async fn find_cart(&self, owner: Owner) -> Result<Option<Cart>>;

    /// Persists a new empty cart.
    async fn create_cart(&self, cart: &Cart) -> Result<()>;

    /// Adds `quantity` of a product to the cart, incrementing the
    /// existing line if one is already present.
    async fn add_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()>;

    /// Sets the quantity of an existing line. Returns false if no line
    /// exists for the product. `quantity` must be positive; removal is
    /// [`Store::remove_cart_item`].
    async fn set_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool>;

    /// Removes a line item. Returns false if no line existed.
    async fn remove_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<bool>;

    /// Removes all line items and the promo snapshot from the cart. The
    /// cart row itself persists for reuse.
    async fn clear_cart(&self, cart_id: CartId) -> Result<()>;

    /// Writes or clears the cart's promo snapshot.
    async fn set_cart_promo(&self, cart_id: CartId, promo: Option<&AppliedPromo>) -> Result<()>;

    /// Records a promo application for auditing.
    async fn record_promo_usage(
        &self,
        cart_id: CartId,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Merges the line items of `from` into `into` (overlapping products
    /// add quantities), then empties `from` and discards its promo.
    /// Atomic.
    async fn merge_carts(&self, from: CartId, into: CartId) -> Result<()>;

    // -- Promotions --

    /// Inserts a promotion definition.
    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()>;

    /// Finds a promotion by code, case-insensitively.
    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>>;

    // -- Payment methods --

    /// Inserts a payment method.
    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<()>;

    /// Loads a payment method by id.
    async fn get_payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>>;

    // -- Guest sessions --

    /// Persists a new guest session.
    async fn insert_guest_session(&self, session: &GuestSession) -> Result<()>;

    /// Loads a guest session by id (never by secret).
    async fn get_guest_session(&self, id: SessionId) -> Result<Option<GuestSession>>;

    /// Updates a session's last-seen timestamp.
    async fn touch_guest_session(&self, id: SessionId, seen_at: DateTime<Utc>) -> Result<()>;

    // -- Checkout & orders --

    /// Atomically reserves stock for every order line (guarded decrement,
    /// all-or-nothing), inserts the order with its items, and clears the
    /// cart. Any failure rolls the reservation back; a failed line
    /// surfaces as [`StoreError::InsufficientStock`] or
    /// [`StoreError::ProductNotFound`].
    ///
    /// [`StoreError::InsufficientStock`]: crate::StoreError::InsufficientStock
    /// [`StoreError::ProductNotFound`]: crate::StoreError::ProductNotFound
    async fn commit_checkout(
        &self,
        cart_id: CartId,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<()>;

    /// Loads an order with its line items.
    async fn get_order(&self, id: OrderId) -> Result<Option<(Order, Vec<OrderItem>)>>;

    /// Lists orders for an owner, newest first.
    async fn list_orders(&self, owner: Owner) -> Result<Vec<Order>>;

    /// Compare-and-set status update: applies `update` only if the order
    /// is currently in `expected` status, else
    /// [`StoreError::StatusConflict`].
    ///
    /// [`StoreError::StatusConflict`]: crate::StoreError::StatusConflict
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<()>;

    /// Atomically cancels an order (compare-and-set from `expected`) and
    /// restores stock for every given line. The restore is unguarded.
    async fn cancel_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        restore: &[StockLine],
    ) -> Result<()>;
}
