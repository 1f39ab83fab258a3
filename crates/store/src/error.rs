use common::{OrderId, ProductId};
use domain::OrderStatus;
use thiserror::Error;

/// Errors that can occur when interacting with the storefront store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced product row does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A guarded stock decrement found fewer units than requested.
    /// The first failing product aborts the whole reservation.
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// A compare-and-set status update found the order in a different
    /// status than expected (concurrent transition or missing row).
    #[error("Status conflict for order {order_id}: expected {expected}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
    },

    /// A stored row failed to map back into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
