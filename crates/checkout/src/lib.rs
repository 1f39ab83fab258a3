//! Storefront services.
//!
//! This crate composes the pure domain rules with the store: cart
//! management with guest-to-user merge, the atomic checkout
//! orchestration, the order lifecycle, and guest sessions.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod orders;
pub mod pricing;
pub mod session;

pub use cart::{CartLine, CartService, CartView};
pub use checkout::{CheckoutRequest, CheckoutService};
pub use error::{CheckoutError, Result};
pub use orders::{OrderService, Viewer};
pub use pricing::{PricingConfig, Totals};
pub use session::SessionService;
