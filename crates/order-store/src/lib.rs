//! Persistence layer for orders and their audit trail.
//!
//! Every mutating write couples the order row, its line items, and one
//! appended history entry into a single atomic unit, guarded by an
//! optimistic version check on the order row.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::HistoryQuery;
pub use store::{HistoryStream, OrderStore, OrderStoreExt, validate_write};
