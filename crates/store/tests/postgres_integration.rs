//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{Money, OrderId, PaymentMethodId, ProductId, SessionId, UserId};
use domain::{
    Cart, GuestSession, Order, OrderItem, OrderStatus, Owner, PaymentMethod, Product, Promotion,
};
use sqlx::PgPool;
use store::{PostgresStore, StatusUpdate, StockLine, Store, StoreError};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!("../../../migrations/0001_init.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE promo_usages, order_items, orders, cart_items, carts, \
         promotions, payment_methods, guest_sessions, products",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn test_product(stock: u32, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(),
        name: "Widget".to_string(),
        price: Money::from_cents(price_cents),
        cost: Some(Money::from_cents(price_cents / 2)),
        stock_quantity: stock,
        is_active: true,
        category: Some("gadgets".to_string()),
        image_url: None,
        created_at: now,
        updated_at: now,
    }
}

fn test_order(owner: Owner, items: &[OrderItem], payment_method_id: PaymentMethodId) -> Order {
    let subtotal: Money = items.iter().map(|i| i.line_total()).sum();
    Order {
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
        payment_method_id,
        order_date: Utc::now(),
        shipped_date: None,
        delivered_date: None,
    }
}

async fn seed_payment_method(store: &PostgresStore) -> PaymentMethodId {
    let method = PaymentMethod {
        id: PaymentMethodId::new(),
        name: "Credit Card".to_string(),
        is_active: true,
    };
    store.insert_payment_method(&method).await.unwrap();
    method.id
}

fn order_line(product: &Product, quantity: u32) -> OrderItem {
    OrderItem {
        product_id: product.id,
        product_name: product.name.clone(),
        quantity,
        unit_price: product.price,
    }
}

#[tokio::test]
#[serial]
async fn product_roundtrip_and_active_listing() {
    let store = get_test_store().await;

    let mut inactive = test_product(3, 999);
    inactive.is_active = false;
    let active = test_product(5, 1_999);
    store.insert_product(&inactive).await.unwrap();
    store.insert_product(&active).await.unwrap();

    let loaded = store.get_product(active.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Widget");
    assert_eq!(loaded.price, Money::from_cents(1_999));
    assert_eq!(loaded.stock_quantity, 5);

    let listed = store.list_active_products().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, active.id);
}

#[tokio::test]
#[serial]
async fn cart_item_upsert_increments_quantity() {
    let store = get_test_store().await;
    let product = test_product(10, 1_000);
    store.insert_product(&product).await.unwrap();

    let cart = Cart::new(Owner::User(UserId::new()), Utc::now());
    store.create_cart(&cart).await.unwrap();

    store.add_cart_item(cart.id, product.id, 2).await.unwrap();
    store.add_cart_item(cart.id, product.id, 3).await.unwrap();

    let loaded = store.find_cart(cart.owner).await.unwrap().unwrap();
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.item(product.id).unwrap().quantity, 5);
}

#[tokio::test]
#[serial]
async fn commit_checkout_decrements_stock_and_clears_cart() {
    let store = get_test_store().await;
    let product = test_product(5, 2_500);
    store.insert_product(&product).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::User(UserId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    store.add_cart_item(cart.id, product.id, 2).await.unwrap();

    let items = vec![order_line(&product, 2)];
    let order = test_order(owner, &items, payment_method_id);
    store.commit_checkout(cart.id, &order, &items).await.unwrap();

    let product = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock_quantity, 3);

    let cart = store.find_cart(owner).await.unwrap().unwrap();
    assert!(cart.is_empty());

    let (loaded, loaded_items) = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.owner, owner);
    assert_eq!(loaded_items.len(), 1);
    assert_eq!(loaded_items[0].quantity, 2);
}

#[tokio::test]
#[serial]
async fn commit_checkout_keeps_lines_added_after_read() {
    let store = get_test_store().await;
    let ordered = test_product(10, 1_000);
    let late = test_product(10, 2_000);
    store.insert_product(&ordered).await.unwrap();
    store.insert_product(&late).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::User(UserId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    store.add_cart_item(cart.id, ordered.id, 2).await.unwrap();

    let items = vec![order_line(&ordered, 2)];
    let order = test_order(owner, &items, payment_method_id);

    // A second tab adds a line between the cart read and the commit.
    store.add_cart_item(cart.id, late.id, 1).await.unwrap();

    store.commit_checkout(cart.id, &order, &items).await.unwrap();

    let cart = store.find_cart(owner).await.unwrap().unwrap();
    assert!(cart.item(ordered.id).is_none());
    assert_eq!(cart.item(late.id).unwrap().quantity, 1);
}

#[tokio::test]
#[serial]
async fn commit_checkout_rolls_back_on_short_stock() {
    let store = get_test_store().await;
    let plenty = test_product(10, 1_000);
    let scarce = test_product(1, 1_000);
    store.insert_product(&plenty).await.unwrap();
    store.insert_product(&scarce).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::User(UserId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    store.add_cart_item(cart.id, plenty.id, 2).await.unwrap();
    store.add_cart_item(cart.id, scarce.id, 3).await.unwrap();

    let items = vec![order_line(&plenty, 2), order_line(&scarce, 3)];
    let order = test_order(owner, &items, payment_method_id);

    let err = store
        .commit_checkout(cart.id, &order, &items)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock { available: 1, requested: 3, .. }
    ));

    // The earlier decrement must have rolled back with the transaction.
    let plenty = store.get_product(plenty.id).await.unwrap().unwrap();
    assert_eq!(plenty.stock_quantity, 10);
    assert!(store.get_order(order.id).await.unwrap().is_none());

    let cart = store.find_cart(owner).await.unwrap().unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
#[serial]
async fn status_update_is_compare_and_set() {
    let store = get_test_store().await;
    let product = test_product(5, 1_000);
    store.insert_product(&product).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::User(UserId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    let items = vec![order_line(&product, 1)];
    let order = test_order(owner, &items, payment_method_id);
    store.commit_checkout(cart.id, &order, &items).await.unwrap();

    store
        .update_order_status(
            order.id,
            OrderStatus::Pending,
            StatusUpdate::to(OrderStatus::Paid),
        )
        .await
        .unwrap();

    let err = store
        .update_order_status(
            order.id,
            OrderStatus::Pending,
            StatusUpdate::to(OrderStatus::Cancelled),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StatusConflict { .. }));

    let (order, _) = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn status_update_stamps_shipped_date() {
    let store = get_test_store().await;
    let product = test_product(5, 1_000);
    store.insert_product(&product).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::Guest(SessionId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    let items = vec![order_line(&product, 1)];
    let order = test_order(owner, &items, payment_method_id);
    store.commit_checkout(cart.id, &order, &items).await.unwrap();

    store
        .update_order_status(
            order.id,
            OrderStatus::Pending,
            StatusUpdate::to(OrderStatus::Paid),
        )
        .await
        .unwrap();
    store
        .update_order_status(
            order.id,
            OrderStatus::Paid,
            StatusUpdate::to(OrderStatus::Processing),
        )
        .await
        .unwrap();

    let shipped_at = Utc::now();
    let mut update = StatusUpdate::to(OrderStatus::Shipped);
    update.shipped_date = Some(shipped_at);
    store
        .update_order_status(order.id, OrderStatus::Processing, update)
        .await
        .unwrap();

    let (order, _) = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert!(order.shipped_date.is_some());
    assert!(order.delivered_date.is_none());
}

#[tokio::test]
#[serial]
async fn cancel_order_restores_stock() {
    let store = get_test_store().await;
    let product = test_product(5, 1_000);
    store.insert_product(&product).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let owner = Owner::User(UserId::new());
    let cart = Cart::new(owner, Utc::now());
    store.create_cart(&cart).await.unwrap();
    let items = vec![order_line(&product, 2)];
    let order = test_order(owner, &items, payment_method_id);
    store.commit_checkout(cart.id, &order, &items).await.unwrap();

    store
        .cancel_order(
            order.id,
            OrderStatus::Pending,
            &[StockLine::new(product.id, 2)],
        )
        .await
        .unwrap();

    let product = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock_quantity, 5);

    let (order, _) = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn merge_carts_adds_quantities_and_empties_source() {
    let store = get_test_store().await;
    let shared = test_product(10, 1_000);
    let extra = test_product(10, 2_000);
    store.insert_product(&shared).await.unwrap();
    store.insert_product(&extra).await.unwrap();

    let guest = Cart::new(Owner::Guest(SessionId::new()), Utc::now());
    let user = Cart::new(Owner::User(UserId::new()), Utc::now());
    store.create_cart(&guest).await.unwrap();
    store.create_cart(&user).await.unwrap();

    store.add_cart_item(guest.id, shared.id, 2).await.unwrap();
    store.add_cart_item(guest.id, extra.id, 1).await.unwrap();
    store.add_cart_item(user.id, shared.id, 3).await.unwrap();

    store.merge_carts(guest.id, user.id).await.unwrap();

    let user = store.find_cart(user.owner).await.unwrap().unwrap();
    assert_eq!(user.item(shared.id).unwrap().quantity, 5);
    assert_eq!(user.item(extra.id).unwrap().quantity, 1);

    let guest = store.find_cart(guest.owner).await.unwrap().unwrap();
    assert!(guest.is_empty());
    assert!(guest.promo.is_none());
}

#[tokio::test]
#[serial]
async fn promotion_lookup_is_case_insensitive() {
    let store = get_test_store().await;
    let promotion = Promotion {
        id: Uuid::new_v4(),
        code: "SAVE10".to_string(),
        percentage: 10.0,
        expires_at: Utc::now() + Duration::days(7),
    };
    store.insert_promotion(&promotion).await.unwrap();

    let found = store.find_promotion("save10").await.unwrap().unwrap();
    assert_eq!(found.code, "SAVE10");
    assert_eq!(found.percentage, 10.0);

    assert!(store.find_promotion("missing").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn guest_session_roundtrip_and_touch() {
    let store = get_test_store().await;
    let now = Utc::now();
    let session = GuestSession::new(now, now + Duration::hours(720));
    store.insert_guest_session(&session).await.unwrap();

    let loaded = store.get_guest_session(session.id).await.unwrap().unwrap();
    assert!(loaded.secret_matches(&session.secret));

    let seen = now + Duration::minutes(5);
    store.touch_guest_session(session.id, seen).await.unwrap();
    let loaded = store.get_guest_session(session.id).await.unwrap().unwrap();
    assert_eq!(loaded.last_seen_at, seen);
}

#[tokio::test]
#[serial]
async fn list_orders_is_scoped_to_owner() {
    let store = get_test_store().await;
    let product = test_product(10, 1_000);
    store.insert_product(&product).await.unwrap();
    let payment_method_id = seed_payment_method(&store).await;

    let alice = Owner::User(UserId::new());
    let bob = Owner::User(UserId::new());

    for owner in [alice, bob] {
        let cart = Cart::new(owner, Utc::now());
        store.create_cart(&cart).await.unwrap();
        let items = vec![order_line(&product, 1)];
        let order = test_order(owner, &items, payment_method_id);
        store.commit_checkout(cart.id, &order, &items).await.unwrap();
    }

    let orders = store.list_orders(alice).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].owner, alice);
}
