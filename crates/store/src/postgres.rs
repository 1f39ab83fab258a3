use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use common::{CartId, OrderId, PaymentMethodId, ProductId, SessionId, UserId};
use common::Money;
use domain::{
    AppliedPromo, Cart, CartItem, GuestSession, Order, OrderItem, OrderStatus, Owner,
    PaymentMethod, Product, Promotion,
};

use crate::{
    StoreError,
    error::Result,
    store::{StatusUpdate, StockLine, Store},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Guarded decrement for every line; zero rows affected means the
    /// product is either missing or short on stock, and the distinction
    /// is reported. Errors abort the enclosing transaction.
    async fn reserve_stock(
        tx: &mut Transaction<'_, Postgres>,
        lines: &[StockLine],
    ) -> Result<()> {
        for line in lines {
            let affected = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND stock_quantity >= $2
                "#,
            )
            .bind(line.product_id.as_uuid())
            .bind(line.quantity as i32)
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if affected == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(line.product_id.as_uuid())
                        .fetch_optional(&mut **tx)
                        .await?;

                return Err(match available {
                    Some(available) => StoreError::InsufficientStock {
                        product_id: line.product_id,
                        available: available.max(0) as u32,
                        requested: line.quantity,
                    },
                    None => StoreError::ProductNotFound(line.product_id),
                });
            }
        }
        Ok(())
    }

    /// Unguarded increment, used when a cancellation returns stock.
    async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        lines: &[StockLine],
    ) -> Result<()> {
        for line in lines {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity + $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(line.product_id.as_uuid())
            .bind(line.quantity as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, added_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY added_at ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    added_at: row.try_get("added_at")?,
                })
            })
            .collect()
    }
}

fn row_to_owner(row: &PgRow) -> Result<Owner> {
    let user_id: Option<Uuid> = row.try_get("user_id")?;
    let session_id: Option<Uuid> = row.try_get("session_id")?;
    match (user_id, session_id) {
        (Some(id), None) => Ok(Owner::User(UserId::from_uuid(id))),
        (None, Some(id)) => Ok(Owner::Guest(SessionId::from_uuid(id))),
        _ => Err(StoreError::Corrupt(
            "row must have exactly one of user_id / session_id".to_string(),
        )),
    }
}

fn row_to_promo(row: &PgRow) -> Result<Option<AppliedPromo>> {
    let code: Option<String> = row.try_get("promo_code")?;
    let percentage: Option<f64> = row.try_get("promo_percentage")?;
    match (code, percentage) {
        (Some(code), Some(percentage)) => Ok(Some(AppliedPromo { code, percentage })),
        (None, None) => Ok(None),
        _ => Err(StoreError::Corrupt(
            "promo code and percentage must be set together".to_string(),
        )),
    }
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        cost: row
            .try_get::<Option<i64>, _>("cost_cents")?
            .map(Money::from_cents),
        stock_quantity: row.try_get::<i32, _>("stock_quantity")?.max(0) as u32,
        is_active: row.try_get("is_active")?,
        category: row.try_get("category")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status_str: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown order status: {status_str}")))?;

    let promo: Option<AppliedPromo> = {
        let code: Option<String> = row.try_get("promo_code")?;
        let percentage: Option<f64> = row.try_get("discount_percentage")?;
        match (code, percentage) {
            (Some(code), Some(percentage)) => Some(AppliedPromo { code, percentage }),
            (None, None) => None,
            _ => {
                return Err(StoreError::Corrupt(
                    "order promo fields must be set together".to_string(),
                ));
            }
        }
    };

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        owner: row_to_owner(row)?,
        status,
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        discount: Money::from_cents(row.try_get("discount_cents")?),
        promo,
        tax: Money::from_cents(row.try_get("tax_cents")?),
        tax_rate: row.try_get("tax_rate")?,
        total: Money::from_cents(row.try_get("total_cents")?),
        payment_method_id: PaymentMethodId::from_uuid(
            row.try_get::<Uuid, _>("payment_method_id")?,
        ),
        order_date: row.try_get("order_date")?,
        shipped_date: row.try_get("shipped_date")?,
        delivered_date: row.try_get("delivered_date")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, price_cents, cost_cents, stock_quantity, is_active,
                 category, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.cost.map(|c| c.cents()))
        .bind(product.stock_quantity as i32)
        .bind(product.is_active)
        .bind(&product.category)
        .bind(&product.image_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_active_products(&self) -> Result<Vec<Product>> {
        let rows =
            sqlx::query("SELECT * FROM products WHERE is_active ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn find_cart(&self, owner: Owner) -> Result<Option<Cart>> {
        let row = match owner {
            Owner::User(user_id) => {
                sqlx::query("SELECT * FROM carts WHERE user_id = $1")
                    .bind(user_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?
            }
            Owner::Guest(session_id) => {
                sqlx::query("SELECT * FROM carts WHERE session_id = $1")
                    .bind(session_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let cart_id = CartId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let items = self.load_cart_items(cart_id).await?;

        Ok(Some(Cart {
            id: cart_id,
            owner,
            promo: row_to_promo(&row)?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn create_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, session_id, promo_code, promo_percentage,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.owner.user_id().map(|id| id.as_uuid()))
        .bind(cart.owner.session_id().map(|id| id.as_uuid()))
        .bind(cart.promo.as_ref().map(|p| p.code.as_str()))
        .bind(cart.promo.as_ref().map(|p| p.percentage))
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        // Upsert keeps the (cart, product) uniqueness invariant in a
        // single statement, so two tabs adding concurrently both land.
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT ON CONSTRAINT unique_cart_product
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn remove_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let affected =
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id.as_uuid())
                .bind(product_id.as_uuid())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            UPDATE carts
            SET promo_code = NULL, promo_percentage = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_cart_promo(&self, cart_id: CartId, promo: Option<&AppliedPromo>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE carts
            SET promo_code = $2, promo_percentage = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(promo.map(|p| p.code.as_str()))
        .bind(promo.map(|p| p.percentage))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_promo_usage(
        &self,
        cart_id: CartId,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO promo_usages (id, cart_id, code, used_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(cart_id.as_uuid())
        .bind(code)
        .bind(used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn merge_carts(&self, from: CartId, into: CartId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at)
            SELECT gen_random_uuid(), $2, product_id, quantity, added_at
            FROM cart_items
            WHERE cart_id = $1
            ON CONFLICT ON CONSTRAINT unique_cart_product
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(from.as_uuid())
        .bind(into.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(from.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE carts
            SET promo_code = NULL, promo_percentage = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(from.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(into.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        sqlx::query(
            "INSERT INTO promotions (id, code, percentage, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(promotion.id)
        .bind(&promotion.code)
        .bind(promotion.percentage)
        .bind(promotion.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_promotion(&self, code: &str) -> Result<Option<Promotion>> {
        let row = sqlx::query("SELECT * FROM promotions WHERE LOWER(code) = LOWER($1)")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Promotion {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
                percentage: row.try_get("percentage")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        sqlx::query("INSERT INTO payment_methods (id, name, is_active) VALUES ($1, $2, $3)")
            .bind(method.id.as_uuid())
            .bind(&method.name)
            .bind(method.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        let row = sqlx::query("SELECT * FROM payment_methods WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(PaymentMethod {
                id: PaymentMethodId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .transpose()
    }

    async fn insert_guest_session(&self, session: &GuestSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO guest_sessions (id, secret, created_at, last_seen_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(&session.secret)
        .bind(session.created_at)
        .bind(session.last_seen_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_guest_session(&self, id: SessionId) -> Result<Option<GuestSession>> {
        let row = sqlx::query("SELECT * FROM guest_sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(GuestSession {
                id: SessionId::from_uuid(row.try_get::<Uuid, _>("id")?),
                secret: row.try_get("secret")?,
                created_at: row.try_get("created_at")?,
                last_seen_at: row.try_get("last_seen_at")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn touch_guest_session(&self, id: SessionId, seen_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE guest_sessions SET last_seen_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(seen_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, order, items), fields(order_id = %order.id))]
    async fn commit_checkout(
        &self,
        cart_id: CartId,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<()> {
        let lines: Vec<StockLine> = items
            .iter()
            .map(|item| StockLine::new(item.product_id, item.quantity))
            .collect();

        let mut tx = self.pool.begin().await?;

        Self::reserve_stock(&mut tx, &lines).await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, session_id, status, shipping_address, billing_address,
                 subtotal_cents, discount_cents, discount_percentage, promo_code,
                 tax_cents, tax_rate, total_cents, payment_method_id, order_date,
                 shipped_date, delivered_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.owner.user_id().map(|id| id.as_uuid()))
        .bind(order.owner.session_id().map(|id| id.as_uuid()))
        .bind(order.status.as_str())
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.subtotal.cents())
        .bind(order.discount.cents())
        .bind(order.promo.as_ref().map(|p| p.percentage))
        .bind(order.promo.as_ref().map(|p| p.code.as_str()))
        .bind(order.tax.cents())
        .bind(order.tax_rate)
        .bind(order.total.cents())
        .bind(order.payment_method_id.as_uuid())
        .bind(order.order_date)
        .bind(order.shipped_date)
        .bind(order.delivered_date)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        // Clear only the lines materialized into the order. A line added
        // concurrently after the cart was read stays in the cart.
        let ordered: Vec<Uuid> = items.iter().map(|i| i.product_id.as_uuid()).collect();
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = ANY($2)")
            .bind(cart_id.as_uuid())
            .bind(&ordered)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE carts
            SET promo_code = NULL, promo_percentage = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<(Order, Vec<OrderItem>)>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = row_to_order(&row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(row_to_order_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some((order, items)))
    }

    async fn list_orders(&self, owner: Owner) -> Result<Vec<Order>> {
        let rows = match owner {
            Owner::User(user_id) => {
                sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY order_date DESC")
                    .bind(user_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await?
            }
            Owner::Guest(session_id) => {
                sqlx::query(
                    "SELECT * FROM orders WHERE session_id = $1 ORDER BY order_date DESC",
                )
                .bind(session_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_order).collect()
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                shipped_date = COALESCE($4, shipped_date),
                delivered_date = COALESCE($5, delivered_date),
                payment_method_id = COALESCE($6, payment_method_id)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(update.status.as_str())
        .bind(update.shipped_date)
        .bind(update.delivered_date)
        .bind(update.payment_method_id.map(|p| p.as_uuid()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, restore))]
    async fn cancel_order(
        &self,
        id: OrderId,
        expected: OrderStatus,
        restore: &[StockLine],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(OrderStatus::Cancelled.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
            });
        }

        Self::restore_stock(&mut tx, restore).await?;

        tx.commit().await?;
        Ok(())
    }
}
