//! Catalog lookup trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::ItemId;
use domain::Money;

use crate::error::ReconcileError;

/// A catalog item as seen at order-creation time.
///
/// Price and availability are a snapshot, not a live lock; the order keeps
/// its own copy of whatever it was sold at.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub name: String,
    pub unit_price: Money,
    pub is_active: bool,
    pub quantity_on_hand: u32,
}

/// Trait for resolving catalog items.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolves an item ID to its current catalog entry.
    async fn get_item(&self, item_id: ItemId) -> Result<CatalogItem, ReconcileError>;
}

/// In-memory catalog for tests and the default binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<ItemId, CatalogItem>>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item and returns its generated ID.
    pub fn add_item(&self, name: impl Into<String>, unit_price: Money, quantity_on_hand: u32) -> ItemId {
        let item_id = ItemId::new();
        self.items.write().unwrap().insert(
            item_id,
            CatalogItem {
                name: name.into(),
                unit_price,
                is_active: true,
                quantity_on_hand,
            },
        );
        item_id
    }

    /// Registers an item under a caller-chosen ID.
    pub fn register(&self, item_id: ItemId, item: CatalogItem) {
        self.items.write().unwrap().insert(item_id, item);
    }

    /// Marks an item as inactive.
    pub fn deactivate(&self, item_id: ItemId) {
        if let Some(item) = self.items.write().unwrap().get_mut(&item_id) {
            item.is_active = false;
        }
    }

    /// Returns the number of registered items.
    pub fn item_count(&self) -> usize {
        self.items.read().unwrap().len()
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn get_item(&self, item_id: ItemId) -> Result<CatalogItem, ReconcileError> {
        self.items
            .read()
            .unwrap()
            .get(&item_id)
            .cloned()
            .ok_or(ReconcileError::ItemNotFound(item_id))
    }
}
