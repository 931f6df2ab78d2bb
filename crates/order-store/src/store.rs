use std::pin::Pin;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BusinessId, LocationId, OrderId, Version};
use domain::{HistoryEntry, Order};
use futures_core::Stream;

use crate::{HistoryQuery, Result, StoreError};

/// A stream of audit entries, oldest first.
pub type HistoryStream = Pin<Box<dyn Stream<Item = Result<HistoryEntry>> + Send>>;

/// Core trait for order store implementations.
///
/// Every write couples the order row, its line items, and one new history
/// entry into a single atomic unit: either all of them land or none do.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a freshly created order with its initial history entry.
    ///
    /// Fails with `DuplicateOrderNumber` if the generated order number is
    /// already taken (the caller retries with the next candidate).
    async fn insert(&self, order: &Order, entry: &HistoryEntry) -> Result<()>;

    /// Persists a mutated order with its new history entry.
    ///
    /// The order's own `version()` is the version observed at load time;
    /// the write succeeds only if the stored row is still at that version
    /// and commits at `version().next()`, which is returned. A moved row
    /// fails with `VersionConflict` and nothing is written.
    async fn update(&self, order: &Order, entry: &HistoryEntry) -> Result<Version>;

    /// Retrieves an order with its line items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders placed at a location, newest first.
    async fn list_by_location(&self, location_id: LocationId) -> Result<Vec<Order>>;

    /// Retrieves the full audit trail of one order, oldest first.
    async fn history(&self, order_id: OrderId) -> Result<Vec<HistoryEntry>>;

    /// Retrieves audit entries matching a query, oldest first.
    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<HistoryEntry>>;

    /// Streams the entire audit trail across all orders, oldest first.
    ///
    /// Intended for export; the trail is append-only so the stream is
    /// stable under concurrent writes.
    async fn stream_history(&self) -> Result<HistoryStream>;

    /// Returns the current stored version of an order.
    ///
    /// Returns None if the order doesn't exist.
    async fn current_version(&self, order_id: OrderId) -> Result<Option<Version>>;

    /// Counts a business's orders dated on the given day.
    ///
    /// Seeds per-business/day order-number sequencing.
    async fn sequence_for_day(&self, business_id: BusinessId, day: NaiveDate) -> Result<u32>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Checks if an order exists.
    async fn exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.current_version(order_id).await?.is_some())
    }

    /// Retrieves an order, failing with `OrderNotFound` if absent.
    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.get(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Validates an order/entry pair before it is written.
///
/// The entry must reference the order, and its `new_status` must equal the
/// order's current status: that is the invariant that makes the latest
/// history row authoritative for the order's state.
pub fn validate_write(order: &Order, entry: &HistoryEntry) -> Result<()> {
    if entry.order_id != order.id() {
        return Err(StoreError::Inconsistent(format!(
            "history entry references order {}, write is for order {}",
            entry.order_id,
            order.id()
        )));
    }
    if entry.new_status != order.status() {
        return Err(StoreError::Inconsistent(format!(
            "history entry records status {}, order is {}",
            entry.new_status,
            order.status()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{HistoryEntry, OrderStatus, actions};

    use crate::test_support::sample_order;

    #[test]
    fn validate_write_accepts_matching_pair() {
        let order = sample_order();
        let entry = HistoryEntry::new(
            order.id(),
            common::UserId::new(),
            actions::CREATED,
            None,
            OrderStatus::Pending,
            None,
        );
        assert!(validate_write(&order, &entry).is_ok());
    }

    #[test]
    fn validate_write_rejects_wrong_order() {
        let order = sample_order();
        let entry = HistoryEntry::new(
            OrderId::new(),
            common::UserId::new(),
            actions::CREATED,
            None,
            OrderStatus::Pending,
            None,
        );
        assert!(matches!(
            validate_write(&order, &entry),
            Err(StoreError::Inconsistent(_))
        ));
    }

    #[test]
    fn validate_write_rejects_status_mismatch() {
        let order = sample_order();
        let entry = HistoryEntry::new(
            order.id(),
            common::UserId::new(),
            actions::STATUS_CHANGED,
            Some(OrderStatus::Pending),
            OrderStatus::Confirmed,
            None,
        );
        assert!(matches!(
            validate_write(&order, &entry),
            Err(StoreError::Inconsistent(_))
        ));
    }
}
