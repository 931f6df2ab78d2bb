//! Domain layer for the retail-ops order backend.
//!
//! This crate provides the financial core:
//! - exact money and quantity value types
//! - the Order aggregate with its line items and totals derivation
//! - the order/payment lifecycle state machines
//! - the append-only history (audit) entry type

pub mod history;
pub mod order;

pub use history::{HistoryEntry, HistoryId, actions};
pub use order::{
    CustomerInfo, DiscountSpec, DiscountType, LineItem, LineItemParts, Money, NewOrder, Order,
    OrderError, OrderParts, OrderStatus, ParseMoneyError, ParseStatusError, PaymentStatus,
    Quantity, RefundStatus, derive_remaining,
};
