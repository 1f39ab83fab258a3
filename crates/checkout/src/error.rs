//! Service-level error type.

use common::ProductId;
use domain::{DomainError, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the storefront services.
///
/// Domain rule violations and store conflicts both funnel into this enum,
/// which the API layer maps onto HTTP statuses.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist, or the caller may not see it.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Promo code does not exist or has expired.
    #[error("Invalid promo code: {0}")]
    InvalidPromo(String),

    /// The request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stock reservation found fewer units than requested.
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The order state machine rejects the requested edge.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => Self::NotFound(format!("Product not found: {id}")),
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => Self::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StoreError::StatusConflict { order_id, .. } => {
                Self::Conflict(format!("Order {order_id} was modified concurrently"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::InvalidPromo(code) => Self::InvalidPromo(code),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::InvalidStatusTransition { from, to } => {
                Self::InvalidStatusTransition { from, to }
            }
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
