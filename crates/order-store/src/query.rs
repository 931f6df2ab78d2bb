use chrono::{DateTime, Utc};
use common::{OrderId, UserId};

/// Builder for filtering the audit trail.
///
/// Allows narrowing history entries by order, actor, action tag, and time
/// window.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Filter by order ID.
    pub order_id: Option<OrderId>,

    /// Filter by acting user.
    pub user_id: Option<UserId>,

    /// Filter by action tags (any of these).
    pub actions: Option<Vec<String>>,

    /// Filter by entries at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by entries at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl HistoryQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific order.
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Filters by order ID.
    pub fn order_id(mut self, id: OrderId) -> Self {
        self.order_id = Some(id);
        self
    }

    /// Filters by acting user.
    pub fn user_id(mut self, id: UserId) -> Self {
        self.user_id = Some(id);
        self
    }

    /// Filters by a single action tag.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions = Some(vec![action.into()]);
        self
    }

    /// Filters by multiple action tags (any of these).
    pub fn actions(mut self, actions: Vec<String>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Filters to entries at or after this timestamp.
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to entries at or before this timestamp.
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Limits the number of entries returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many entries before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
