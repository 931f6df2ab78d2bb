//! Append-only audit trail of order status transitions.
//!
//! One entry is written per state-changing operation, in the same atomic
//! unit as the order mutation itself. Entries are never updated or
//! deleted, and an order's current status always equals the `new_status`
//! of its most recent entry.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::OrderStatus;

/// Action tags for the well-known state-changing operations. The field is
/// free-form so stores can carry tags this build does not know about.
pub mod actions {
    pub const CREATED: &str = "created";
    pub const PAYMENT_CAPTURED: &str = "payment_captured";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const REFUNDED: &str = "refunded";
}

/// Unique identifier for a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(Uuid);

impl HistoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for HistoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub order_id: OrderId,
    /// The acting user.
    pub user_id: UserId,
    pub action: String,
    /// `None` only for the creation entry.
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates an entry stamped with a fresh ID and the current time.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        action: impl Into<String>,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            order_id,
            user_id,
            action: action.into(),
            previous_status,
            new_status,
            notes,
            created_at: Utc::now(),
        }
    }
}
