//! Order lifecycle and payment state machines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a persisted status string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status value: {0}")]
pub struct ParseStatusError(pub String);

/// The fulfillment state of an order.
///
/// ```text
/// pending ──► confirmed ──► fulfilled ──► completed
///    │            │             │             │
///    └────────────┴──► cancelled│             │
///                               ├─────────────┤
///                               ▼             ▼
///                  partially_returned ──► returned
/// ```
///
/// `completed`, `cancelled` and `returned` are terminal for the forward
/// flow; returns remain possible from `fulfilled`, `completed` and
/// `partially_returned` until the order is fully returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order received, nothing has happened yet.
    #[default]
    Pending,

    /// Order accepted by the location.
    Confirmed,

    /// Goods handed over / service rendered.
    Fulfilled,

    /// Order closed out (terminal).
    Completed,

    /// Order cancelled before fulfillment (terminal).
    Cancelled,

    /// Some, but not all, line value has been returned.
    PartiallyReturned,

    /// Every line fully returned (terminal).
    Returned,
}

impl OrderStatus {
    /// Returns true if `next` is a legal edge of the status machine.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Fulfilled)
                | (Confirmed, Cancelled)
                | (Fulfilled, Completed)
                | (Fulfilled, PartiallyReturned)
                | (Fulfilled, Returned)
                | (Completed, PartiallyReturned)
                | (Completed, Returned)
                | (PartiallyReturned, PartiallyReturned)
                | (PartiallyReturned, Returned)
        )
    }

    /// Returns true if no forward transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }

    /// Returns true if payments may still be captured in this state.
    pub fn accepts_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Fulfilled
        )
    }

    /// Returns true if line returns may be recorded in this state.
    pub fn accepts_returns(&self) -> bool {
        matches!(
            self,
            OrderStatus::Fulfilled | OrderStatus::Completed | OrderStatus::PartiallyReturned
        )
    }

    /// Returns the state name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PartiallyReturned => "partially_returned",
            OrderStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "partially_returned" => Ok(OrderStatus::PartiallyReturned),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The payment state of an order.
///
/// `pending → partial → paid`, with a direct `pending → paid` edge for a
/// single full capture. `partially_refunded`/`refunded` are reachable only
/// once money has been taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing captured yet.
    #[default]
    Pending,

    /// Some, but not all, of the total captured.
    Partial,

    /// Full total captured.
    Paid,

    /// Part of the captured value has been refunded.
    PartiallyRefunded,

    /// The entire order value has been refunded.
    Refunded,
}

impl PaymentStatus {
    /// Returns true if refunds may be recorded in this state.
    pub fn accepts_refunds(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Partial | PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        )
    }

    /// Returns the state name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// How far refunds have progressed on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Some value refunded, more could follow.
    Partial,

    /// Every line fully returned and refunded.
    Full,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Partial => "partial",
            RefundStatus::Full => "full",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial" => Ok(RefundStatus::Partial),
            "full" => Ok(RefundStatus::Full),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// How a line-level discount was expressed when the order was created.
///
/// Percent discounts are materialized into an amount at creation time;
/// the tag is retained for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percent => "percent",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DiscountType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(DiscountType::Fixed),
            "percent" => Ok(DiscountType::Percent),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
