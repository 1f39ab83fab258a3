//! Post-checkout order lifecycle.
//!
//! Every status write is compare-and-set against the status read at the
//! start of the operation; a concurrent transition loses the race and is
//! reported as an invalid transition from the order's actual status.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, PaymentMethodId};
use domain::{Order, OrderItem, OrderStatus, Owner};
use store::{StatusUpdate, StockLine, Store, StoreError};

use crate::error::{CheckoutError, Result};

/// Who is asking. Admins see and update every order; everyone else only
/// their own, with foreign orders indistinguishable from missing ones.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub owner: Option<Owner>,
    pub is_admin: bool,
}

impl Viewer {
    pub fn owner(owner: Owner) -> Self {
        Self {
            owner: Some(owner),
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            owner: None,
            is_admin: true,
        }
    }

    fn may_see(&self, order: &Order) -> bool {
        self.is_admin || self.owner == Some(order.owner)
    }
}

/// Order lifecycle service: pay, cancel, admin status updates, reads.
pub struct OrderService<S> {
    store: Arc<S>,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Loads an order visible to `viewer`.
    pub async fn get(&self, viewer: Viewer, id: OrderId) -> Result<(Order, Vec<OrderItem>)> {
        let (order, items) = self
            .store
            .get_order(id)
            .await?
            .filter(|(order, _)| viewer.may_see(order))
            .ok_or_else(|| CheckoutError::NotFound(format!("Order not found: {id}")))?;
        Ok((order, items))
    }

    /// Lists the owner's orders, newest first.
    pub async fn list(&self, owner: Owner) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(owner).await?)
    }

    /// Pays a pending order. Paying an already-paid order is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn pay(
        &self,
        viewer: Viewer,
        id: OrderId,
        payment_method_id: PaymentMethodId,
    ) -> Result<(Order, Vec<OrderItem>)> {
        let (order, items) = self.get(viewer, id).await?;

        if order.status == OrderStatus::Paid {
            return Ok((order, items));
        }
        if order.status != OrderStatus::Pending {
            return Err(CheckoutError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }

        self.store
            .get_payment_method(payment_method_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                CheckoutError::NotFound(format!("Payment method not found: {payment_method_id}"))
            })?;

        let mut update = StatusUpdate::to(OrderStatus::Paid);
        update.payment_method_id = Some(payment_method_id);
        self.apply(id, order.status, update).await?;

        metrics::counter!("orders_paid_total").increment(1);
        self.get(viewer, id).await
    }

    /// Cancels an order, restoring stock for every line atomically with
    /// the status change.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, viewer: Viewer, id: OrderId) -> Result<(Order, Vec<OrderItem>)> {
        let (order, items) = self.get(viewer, id).await?;

        if !order.status.is_cancellable() {
            return Err(CheckoutError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let restore: Vec<StockLine> = items
            .iter()
            .map(|item| StockLine::new(item.product_id, item.quantity))
            .collect();

        match self.store.cancel_order(id, order.status, &restore).await {
            Ok(()) => {}
            Err(StoreError::StatusConflict { .. }) => {
                return Err(self.stale_transition(id, OrderStatus::Cancelled).await);
            }
            Err(err) => return Err(err.into()),
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %id, lines = restore.len(), "order cancelled, stock restored");
        self.get(viewer, id).await
    }

    /// Admin status update through the state machine. `Shipped` and
    /// `Delivered` stamp their dates on first entry; a `Cancelled` target
    /// restores stock like [`OrderService::cancel`].
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: &str,
    ) -> Result<(Order, Vec<OrderItem>)> {
        let to = OrderStatus::parse(status).ok_or_else(|| {
            CheckoutError::Validation(format!("unknown order status: {status}"))
        })?;

        let viewer = Viewer::admin();
        let (order, items) = self.get(viewer, id).await?;

        if !order.status.can_transition(to) {
            return Err(CheckoutError::InvalidStatusTransition {
                from: order.status,
                to,
            });
        }

        if to == OrderStatus::Cancelled && order.status != to {
            let restore: Vec<StockLine> = items
                .iter()
                .map(|item| StockLine::new(item.product_id, item.quantity))
                .collect();
            match self.store.cancel_order(id, order.status, &restore).await {
                Ok(()) => {}
                Err(StoreError::StatusConflict { .. }) => {
                    return Err(self.stale_transition(id, to).await);
                }
                Err(err) => return Err(err.into()),
            }
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(order_id = %id, lines = restore.len(), "order cancelled, stock restored");
            return self.get(viewer, id).await;
        }

        let mut update = StatusUpdate::to(to);
        if order.status != to {
            match to {
                OrderStatus::Shipped => update.shipped_date = Some(Utc::now()),
                OrderStatus::Delivered => update.delivered_date = Some(Utc::now()),
                _ => {}
            }
        }
        self.apply(id, order.status, update).await?;
        self.get(viewer, id).await
    }

    async fn apply(&self, id: OrderId, expected: OrderStatus, update: StatusUpdate) -> Result<()> {
        let to = update.status;
        match self.store.update_order_status(id, expected, update).await {
            Ok(()) => Ok(()),
            Err(StoreError::StatusConflict { .. }) => Err(self.stale_transition(id, to).await),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-reads the order to report the transition against its actual
    /// current status.
    async fn stale_transition(&self, id: OrderId, to: OrderStatus) -> CheckoutError {
        match self.store.get_order(id).await {
            Ok(Some((order, _))) => CheckoutError::InvalidStatusTransition {
                from: order.status,
                to,
            },
            Ok(None) => CheckoutError::NotFound(format!("Order not found: {id}")),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId, UserId};
    use domain::{Cart, PaymentMethod, Product};
    use store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        orders: OrderService<InMemoryStore>,
        payment_method_id: PaymentMethodId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let payment_method = PaymentMethod {
            id: PaymentMethodId::new(),
            name: "Credit Card".to_string(),
            is_active: true,
        };
        store.insert_payment_method(&payment_method).await.unwrap();
        Fixture {
            store: store.clone(),
            orders: OrderService::new(store),
            payment_method_id: payment_method.id,
        }
    }

    /// Places an order directly through the store with `quantity` units
    /// of a fresh product that starts with `stock` in the catalog.
    async fn place_order(fixture: &Fixture, owner: Owner, stock: u32, quantity: u32) -> (OrderId, ProductId) {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            price: Money::from_cents(1_000),
            cost: None,
            stock_quantity: stock,
            is_active: true,
            category: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        fixture.store.insert_product(&product).await.unwrap();

        let cart = Cart::new(owner, now);
        fixture.store.create_cart(&cart).await.unwrap();

        let items = vec![OrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
        }];
        let subtotal = Money::from_cents(1_000 * quantity as i64);
        let order = Order {
            id: OrderId::new(),
            owner,
            status: OrderStatus::Pending,
            shipping_address: "1 Main St".to_string(),
            billing_address: None,
            subtotal,
            discount: Money::zero(),
            promo: None,
            tax: Money::zero(),
            tax_rate: 0.0,
            total: subtotal,
            payment_method_id: fixture.payment_method_id,
            order_date: now,
            shipped_date: None,
            delivered_date: None,
        };
        fixture
            .store
            .commit_checkout(cart.id, &order, &items)
            .await
            .unwrap();
        (order.id, product.id)
    }

    #[tokio::test]
    async fn pay_moves_pending_to_paid_and_is_idempotent() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let viewer = Viewer::owner(owner);
        let (order_id, _) = place_order(&fixture, owner, 5, 1).await;

        let (order, _) = fixture
            .orders
            .pay(viewer, order_id, fixture.payment_method_id)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let (order, _) = fixture
            .orders
            .pay(viewer, order_id, fixture.payment_method_id)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn pay_rejects_non_pending_statuses() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let viewer = Viewer::owner(owner);
        let (order_id, _) = place_order(&fixture, owner, 5, 1).await;

        fixture.orders.cancel(viewer, order_id).await.unwrap();

        let err = fixture
            .orders
            .pay(viewer, order_id, fixture.payment_method_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Paid,
            }
        ));
    }

    #[tokio::test]
    async fn cancel_restores_stock() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let viewer = Viewer::owner(owner);
        let (order_id, product_id) = place_order(&fixture, owner, 5, 2).await;

        let before = fixture.store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(before.stock_quantity, 3);

        let (order, _) = fixture.orders.cancel(viewer, order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let after = fixture.store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 5);
    }

    #[tokio::test]
    async fn cancel_after_shipping_is_rejected_without_stock_change() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let viewer = Viewer::owner(owner);
        let (order_id, product_id) = place_order(&fixture, owner, 5, 2).await;

        fixture
            .orders
            .pay(viewer, order_id, fixture.payment_method_id)
            .await
            .unwrap();
        fixture
            .orders
            .update_status(order_id, "Processing")
            .await
            .unwrap();
        fixture.orders.update_status(order_id, "Shipped").await.unwrap();

        let err = fixture.orders.cancel(viewer, order_id).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled,
            }
        ));

        let product = fixture.store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 3);
    }

    #[tokio::test]
    async fn update_status_stamps_dates_and_parses_case_insensitively() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let viewer = Viewer::owner(owner);
        let (order_id, _) = place_order(&fixture, owner, 5, 1).await;

        fixture
            .orders
            .pay(viewer, order_id, fixture.payment_method_id)
            .await
            .unwrap();
        fixture
            .orders
            .update_status(order_id, "processing")
            .await
            .unwrap();
        let (order, _) = fixture.orders.update_status(order_id, "SHIPPED").await.unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert!(order.shipped_date.is_some());
        assert!(order.delivered_date.is_none());

        let (order, _) = fixture.orders.update_status(order_id, "Delivered").await.unwrap();
        assert!(order.delivered_date.is_some());
    }

    #[tokio::test]
    async fn update_status_to_cancelled_restores_stock() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let (order_id, product_id) = place_order(&fixture, owner, 5, 2).await;

        let before = fixture.store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(before.stock_quantity, 3);

        let (order, _) = fixture
            .orders
            .update_status(order_id, "Cancelled")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let after = fixture.store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 5);
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_strings_and_bad_edges() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let (order_id, _) = place_order(&fixture, owner, 5, 1).await;

        let err = fixture
            .orders
            .update_status(order_id, "Teleported")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        let err = fixture
            .orders
            .update_status(order_id, "Delivered")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }
        ));
    }

    #[tokio::test]
    async fn foreign_orders_read_as_not_found() {
        let fixture = fixture().await;
        let owner = Owner::User(UserId::new());
        let (order_id, _) = place_order(&fixture, owner, 5, 1).await;

        let stranger = Viewer::owner(Owner::User(UserId::new()));
        let err = fixture.orders.get(stranger, order_id).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));

        let err = fixture
            .orders
            .pay(stranger, order_id, fixture.payment_method_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));

        // Admins see everything.
        let (order, _) = fixture.orders.get(Viewer::admin(), order_id).await.unwrap();
        assert_eq!(order.id, order_id);
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner() {
        let fixture = fixture().await;
        let alice = Owner::User(UserId::new());
        let bob = Owner::User(UserId::new());
        place_order(&fixture, alice, 5, 1).await;
        place_order(&fixture, bob, 5, 1).await;

        let orders = fixture.orders.list(alice).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].owner, alice);
    }
}
