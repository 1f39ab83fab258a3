//! Shared types used across the storefront crates.
//!
//! Typed UUID wrappers keep the many identifiers in the system (products,
//! carts, orders, users, guest sessions, payment methods) from being mixed
//! up at compile time, and [`Money`] keeps amounts in integer cents.

mod money;
mod types;

pub use money::Money;
pub use types::{CartId, OrderId, PaymentMethodId, ProductId, SessionId, UserId};
