//! Order aggregate and related types.

mod aggregate;
mod line_item;
mod state;
mod value_objects;

pub use aggregate::{CustomerInfo, NewOrder, Order, OrderParts, derive_remaining};
pub use line_item::{DiscountSpec, LineItem, LineItemParts};
pub use state::{DiscountType, OrderStatus, ParseStatusError, PaymentStatus, RefundStatus};
pub use value_objects::{Money, ParseMoneyError, Quantity};

use common::LineItemId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A line item failed validation.
    #[error("invalid line item: {reason}")]
    InvalidLineItem { reason: String },

    /// An order must contain at least one line item.
    #[error("order must contain at least one line item")]
    EmptyOrder,

    /// Tax or discount adjustment out of bounds.
    #[error("invalid adjustment: {reason}")]
    InvalidAdjustment { reason: String },

    /// A payment capture was rejected.
    #[error("invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// The requested status edge is not part of the lifecycle machine.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order cannot accept refunds in its current state.
    #[error("order in state {status}/{payment_status} cannot accept refunds")]
    InvalidRefundState {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    /// A return request was out of bounds for its line.
    #[error("invalid return: {reason}")]
    InvalidReturn { reason: String },

    /// A quantity computation would have gone below zero or overflowed.
    #[error("invalid quantity: {reason}")]
    InvalidQuantity { reason: String },

    /// The referenced line does not belong to the order.
    #[error("line item not found: {0}")]
    LineNotFound(LineItemId),
}

impl OrderError {
    pub(crate) fn invalid_line_item(reason: impl Into<String>) -> Self {
        OrderError::InvalidLineItem {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_adjustment(reason: impl Into<String>) -> Self {
        OrderError::InvalidAdjustment {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_payment(reason: impl Into<String>) -> Self {
        OrderError::InvalidPayment {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_return(reason: impl Into<String>) -> Self {
        OrderError::InvalidReturn {
            reason: reason.into(),
        }
    }
}
