use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BusinessId, LocationId, OrderId, Version};
use domain::{HistoryEntry, Order};
use tokio::sync::RwLock;

use crate::{
    HistoryQuery, Result, StoreError,
    store::{HistoryStream, OrderStore, validate_write},
};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    history: Vec<HistoryEntry>,
    numbers: HashSet<String>,
}

/// In-memory order store implementation.
///
/// Keeps orders, history, and the order-number unique index behind a
/// single lock so every write is atomic, with the same semantics as the
/// PostgreSQL implementation. Used by tests and the default binary.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Returns the total number of history entries.
    pub async fn history_count(&self) -> usize {
        self.inner.read().await.history.len()
    }

    /// Clears all orders and history.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.orders.clear();
        inner.history.clear();
        inner.numbers.clear();
    }
}

fn matches_query(entry: &HistoryEntry, query: &HistoryQuery) -> bool {
    if let Some(id) = query.order_id
        && entry.order_id != id
    {
        return false;
    }
    if let Some(id) = query.user_id
        && entry.user_id != id
    {
        return false;
    }
    if let Some(ref actions) = query.actions
        && !actions.contains(&entry.action)
    {
        return false;
    }
    if let Some(from) = query.from_timestamp
        && entry.created_at < from
    {
        return false;
    }
    if let Some(to) = query.to_timestamp
        && entry.created_at > to
    {
        return false;
    }
    true
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order, entry: &HistoryEntry) -> Result<()> {
        validate_write(order, entry)?;

        let mut inner = self.inner.write().await;

        if inner.numbers.contains(order.order_number()) {
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number().to_string(),
            ));
        }
        if inner.orders.contains_key(&order.id()) {
            return Err(StoreError::Inconsistent(format!(
                "order {} already exists",
                order.id()
            )));
        }

        inner.numbers.insert(order.order_number().to_string());
        inner.orders.insert(order.id(), order.clone());
        inner.history.push(entry.clone());
        Ok(())
    }

    async fn update(&self, order: &Order, entry: &HistoryEntry) -> Result<Version> {
        validate_write(order, entry)?;

        let mut inner = self.inner.write().await;

        let actual = inner
            .orders
            .get(&order.id())
            .map(Order::version)
            .ok_or(StoreError::OrderNotFound(order.id()))?;

        if actual != order.version() {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: order.version(),
                actual,
            });
        }

        let new_version = order.version().next();
        let mut stored = order.clone();
        stored.set_version(new_version);
        inner.orders.insert(order.id(), stored);
        inner.history.push(entry.clone());
        Ok(new_version)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&order_id).cloned())
    }

    async fn list_by_location(&self, location_id: LocationId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|order| order.location_id() == location_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date().cmp(&a.order_date()));
        Ok(orders)
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<HistoryEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let inner = self.inner.read().await;
        let entries = inner
            .history
            .iter()
            .filter(|entry| matches_query(entry, &query))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(entries)
    }

    async fn stream_history(&self) -> Result<HistoryStream> {
        let entries: Vec<HistoryEntry> = self.inner.read().await.history.clone();
        Ok(Box::pin(futures_util::stream::iter(
            entries.into_iter().map(Ok),
        )))
    }

    async fn current_version(&self, order_id: OrderId) -> Result<Option<Version>> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .get(&order_id)
            .map(Order::version))
    }

    async fn sequence_for_day(&self, business_id: BusinessId, day: NaiveDate) -> Result<u32> {
        let inner = self.inner.read().await;
        let count = inner
            .orders
            .values()
            .filter(|order| {
                order.business_id() == business_id && order.order_date().date_naive() == day
            })
            .count();
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderStoreExt;
    use crate::test_support::{creation_entry, sample_order, status_entry};
    use domain::{Money, OrderStatus};
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();

        store.insert(&order, &creation_entry(&order)).await.unwrap();

        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.id(), order.id());
        assert_eq!(loaded.total_amount(), order.total_amount());
        assert_eq!(loaded.lines().len(), order.lines().len());
        assert_eq!(store.history_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_duplicate_number_rejected() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        let clash = sample_order();
        assert_eq!(clash.order_number(), order.order_number());
        let entry = creation_entry(&clash);
        let result = store.insert(&clash, &entry).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));

        // Nothing extra was written
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.history_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        order.change_status(OrderStatus::Confirmed).unwrap();
        let entry = status_entry(&order, Some(OrderStatus::Pending));
        let new_version = store.update(&order, &entry).await.unwrap();

        assert_eq!(new_version, Version::new(2));
        let stored = store.load(order.id()).await.unwrap();
        assert_eq!(stored.version(), Version::new(2));
        assert_eq!(stored.status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_update_stale_version_conflicts() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        // Two writers load the same version
        let mut first = store.load(order.id()).await.unwrap();
        let mut second = store.load(order.id()).await.unwrap();

        first.change_status(OrderStatus::Confirmed).unwrap();
        store
            .update(&first, &status_entry(&first, Some(OrderStatus::Pending)))
            .await
            .unwrap();

        second.change_status(OrderStatus::Cancelled).unwrap();
        let result = store
            .update(&second, &status_entry(&second, Some(OrderStatus::Pending)))
            .await;

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        // The losing write left no trace
        let stored = store.load(order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Confirmed);
        assert_eq!(store.history_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_order_fails() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        order.change_status(OrderStatus::Confirmed).unwrap();
        let entry = status_entry(&order, Some(OrderStatus::Pending));

        let result = store.update(&order, &entry).await;
        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_location_newest_first() {
        let store = InMemoryOrderStore::new();
        let first = sample_order();
        store.insert(&first, &creation_entry(&first)).await.unwrap();

        let second = crate::test_support::sample_order_at(
            first.location_id(),
            first.business_id(),
            "ORD-TEST-0002",
        );
        store
            .insert(&second, &creation_entry(&second))
            .await
            .unwrap();

        let listed = store.list_by_location(first.location_id()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].order_date() >= listed[1].order_date());

        let elsewhere = store.list_by_location(LocationId::new()).await.unwrap();
        assert!(elsewhere.is_empty());
    }

    #[tokio::test]
    async fn test_history_filters_and_order() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        order.change_status(OrderStatus::Confirmed).unwrap();
        store
            .update(&order, &status_entry(&order, Some(OrderStatus::Pending)))
            .await
            .unwrap();

        let trail = store.history(order.id()).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, "created");
        assert_eq!(trail[1].new_status, OrderStatus::Confirmed);
        // Latest entry is authoritative for the order's status
        assert_eq!(
            trail.last().unwrap().new_status,
            store.load(order.id()).await.unwrap().status()
        );
    }

    #[tokio::test]
    async fn test_query_history_by_action() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();
        order.capture_payment(Money::from_cents(100), "cash").unwrap();
        let entry = crate::test_support::payment_entry(&order);
        store.update(&order, &entry).await.unwrap();

        let captured = store
            .query_history(HistoryQuery::new().action("payment_captured"))
            .await
            .unwrap();
        assert_eq!(captured.len(), 1);

        let by_order = store
            .query_history(HistoryQuery::for_order(order.id()).limit(1))
            .await
            .unwrap();
        assert_eq!(by_order.len(), 1);
        assert_eq!(by_order[0].action, "created");
    }

    #[tokio::test]
    async fn test_stream_history_yields_everything() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        let entries: Vec<_> = store
            .stream_history()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_sequence_for_day() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.insert(&order, &creation_entry(&order)).await.unwrap();

        let today = order.order_date().date_naive();
        assert_eq!(
            store
                .sequence_for_day(order.business_id(), today)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .sequence_for_day(BusinessId::new(), today)
                .await
                .unwrap(),
            0
        );
    }
}
