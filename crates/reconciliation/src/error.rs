//! Reconciliation error types.

use common::{ItemId, LocationId, OrderId};
use domain::OrderError;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while orchestrating order operations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A domain rule rejected the operation (invalid line item, payment,
    /// transition, return, ...).
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The catalog does not know the referenced item.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The acting user may not touch this location or order.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The referenced location does not exist.
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A concurrent writer changed the order; the internal retry also
    /// lost the race.
    #[error("conflicting update on order {0}, please retry")]
    ConflictingUpdate(OrderId),

    /// Order-number generation ran out of retry attempts.
    #[error("could not allocate a unique order number after {attempts} attempts")]
    OrderNumberExhausted { attempts: u32 },

    /// A lookup collaborator failed.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The store failed for a reason other than a version conflict.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => ReconcileError::OrderNotFound(id),
            other => ReconcileError::Store(other),
        }
    }
}

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;
