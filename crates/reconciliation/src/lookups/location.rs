//! Location lookup trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{BusinessId, LocationId};

use crate::error::ReconcileError;

/// A location as seen by the reconciliation service.
#[derive(Debug, Clone, Copy)]
pub struct LocationInfo {
    pub business_id: BusinessId,
    pub is_active: bool,
}

/// Trait for resolving locations to their owning business.
#[async_trait]
pub trait LocationLookup: Send + Sync {
    /// Resolves a location ID to its owning business and active flag.
    async fn get_location(&self, location_id: LocationId)
    -> Result<LocationInfo, ReconcileError>;
}

/// In-memory location directory for tests and the default binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocations {
    locations: Arc<RwLock<HashMap<LocationId, LocationInfo>>>,
}

impl InMemoryLocations {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active location and returns its generated ID.
    pub fn add_location(&self, business_id: BusinessId) -> LocationId {
        let location_id = LocationId::new();
        self.locations.write().unwrap().insert(
            location_id,
            LocationInfo {
                business_id,
                is_active: true,
            },
        );
        location_id
    }

    /// Registers a location under a caller-chosen ID.
    pub fn register(&self, location_id: LocationId, info: LocationInfo) {
        self.locations.write().unwrap().insert(location_id, info);
    }

    /// Marks a location as inactive.
    pub fn deactivate(&self, location_id: LocationId) {
        if let Some(info) = self.locations.write().unwrap().get_mut(&location_id) {
            info.is_active = false;
        }
    }
}

#[async_trait]
impl LocationLookup for InMemoryLocations {
    async fn get_location(
        &self,
        location_id: LocationId,
    ) -> Result<LocationInfo, ReconcileError> {
        self.locations
            .read()
            .unwrap()
            .get(&location_id)
            .copied()
            .ok_or(ReconcileError::LocationNotFound(location_id))
    }
}
