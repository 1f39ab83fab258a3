//! Domain error types.

use thiserror::Error;

use crate::status::OrderStatus;

/// Errors raised by pure domain rules.
///
/// Persistence-level failures (missing rows, stock conflicts, database
/// errors) are reported by the `store` crate; everything here can be
/// decided without touching storage.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Promo code does not exist or has expired.
    #[error("Invalid promo code: {0}")]
    InvalidPromo(String),

    /// A promo is already applied to the cart.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The order state machine rejects the requested edge.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
}
