//! Relational persistence for the storefront.
//!
//! The [`Store`] trait is the single seam between the services and
//! storage. [`PostgresStore`] is the production implementation;
//! [`InMemoryStore`] backs unit tests and local runs without a
//! database.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{StatusUpdate, StockLine, Store};
