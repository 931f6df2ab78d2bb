use common::{OrderId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An optimistic version check failed: the row changed between read
    /// and write.
    #[error(
        "version conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// An insert collided with an existing order number.
    #[error("order number already taken: {0}")]
    DuplicateOrderNumber(String),

    /// The order was not found in the store.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An order/history pair failed the pre-write consistency check.
    #[error("inconsistent write: {0}")]
    Inconsistent(String),

    /// A persisted value could not be decoded (corrupt status string,
    /// malformed tags JSON, ...).
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
