//! Domain layer for the storefront checkout engine.
//!
//! Contains the entities (products, carts, orders, promotions, guest
//! sessions), the order status state machine, and the pure pricing rules
//! for promotional discounts and tax. No I/O happens here; persistence
//! lives in the `store` crate and orchestration in `checkout`.

mod cart;
mod error;
mod order;
mod owner;
mod product;
pub mod promo;
mod session;
mod status;
pub mod tax;

pub use cart::{Cart, CartItem};
pub use error::DomainError;
pub use order::{Order, OrderItem, PaymentMethod};
pub use owner::Owner;
pub use product::Product;
pub use promo::{AppliedPromo, Promotion};
pub use session::GuestSession;
pub use status::OrderStatus;
