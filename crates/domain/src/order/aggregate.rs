//! Order aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{BusinessId, LineItemId, LocationId, OrderId, Version};
use serde::{Deserialize, Serialize};

use super::{
    LineItem, LineItemParts, Money, OrderError, OrderStatus, PaymentStatus, Quantity, RefundStatus,
};

/// Optional customer contact details attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Inputs for creating an order. Line items are validated individually via
/// [`LineItem::new`] before they get here.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub location_id: LocationId,
    pub business_id: BusinessId,
    pub customer: CustomerInfo,
    pub order_date: DateTime<Utc>,
    pub lines: Vec<LineItem>,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// Raw field set used to rehydrate a stored order.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: String,
    pub location_id: LocationId,
    pub business_id: BusinessId,
    pub customer: CustomerInfo,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub refund_status: Option<RefundStatus>,
    pub refund_reason: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub lines: Vec<LineItemParts>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pure derivation of the outstanding balance (`total - paid`).
///
/// Invoked at the end of every mutating operation; kept free-standing so
/// the derivation is testable without an order.
pub fn derive_remaining(total_amount: Money, paid_amount: Money) -> Money {
    total_amount - paid_amount
}

/// Order aggregate root.
///
/// A single customer transaction at one location, owning its line items.
/// All mutation goes through the methods below; each one re-derives
/// `remaining_amount` before returning, and the caller (the reconciliation
/// service) persists the order together with a history entry in one atomic
/// unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: String,
    location_id: LocationId,
    business_id: BusinessId,
    customer: CustomerInfo,
    order_date: DateTime<Utc>,
    status: OrderStatus,
    subtotal: Money,
    tax_amount: Money,
    discount_amount: Money,
    total_amount: Money,
    payment_status: PaymentStatus,
    payment_method: Option<String>,
    paid_amount: Money,
    remaining_amount: Money,
    refund_status: Option<RefundStatus>,
    refund_reason: Option<String>,
    notes: Option<String>,
    tags: BTreeMap<String, String>,
    lines: Vec<LineItem>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order from validated line items, deriving all totals.
    ///
    /// The order-wide discount recorded on the order is the supplied
    /// adjustment plus the materialized line discounts, so
    /// `total = subtotal + tax - discount` holds with line discounts
    /// included. Fails with `EmptyOrder` on an empty line list and
    /// `InvalidAdjustment` when tax or discount is negative or the
    /// combined discount exceeds `subtotal + tax`.
    pub fn create(new: NewOrder) -> Result<Self, OrderError> {
        if new.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if new.tax_amount.is_negative() {
            return Err(OrderError::invalid_adjustment(
                "tax amount must not be negative",
            ));
        }
        if new.discount_amount.is_negative() {
            return Err(OrderError::invalid_adjustment(
                "discount amount must not be negative",
            ));
        }

        let subtotal: Money = new.lines.iter().map(|line| line.subtotal()).sum();
        let line_discounts: Money = new.lines.iter().map(|line| line.discount_amount()).sum();
        let discount_amount = new.discount_amount + line_discounts;

        if discount_amount > subtotal + new.tax_amount {
            return Err(OrderError::invalid_adjustment(
                "discount exceeds subtotal plus tax",
            ));
        }

        let total_amount = subtotal + new.tax_amount - discount_amount;
        let now = Utc::now();

        Ok(Self {
            id: new.id,
            order_number: new.order_number,
            location_id: new.location_id,
            business_id: new.business_id,
            customer: new.customer,
            order_date: new.order_date,
            status: OrderStatus::Pending,
            subtotal,
            tax_amount: new.tax_amount,
            discount_amount,
            total_amount,
            payment_status: PaymentStatus::Pending,
            payment_method: new.payment_method,
            paid_amount: Money::zero(),
            remaining_amount: derive_remaining(total_amount, Money::zero()),
            refund_status: None,
            refund_reason: None,
            notes: new.notes,
            tags: new.tags,
            lines: new.lines,
            version: Version::first(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates an order from storage without validation.
    pub fn restore(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            location_id: parts.location_id,
            business_id: parts.business_id,
            customer: parts.customer,
            order_date: parts.order_date,
            status: parts.status,
            subtotal: parts.subtotal,
            tax_amount: parts.tax_amount,
            discount_amount: parts.discount_amount,
            total_amount: parts.total_amount,
            payment_status: parts.payment_status,
            payment_method: parts.payment_method,
            paid_amount: parts.paid_amount,
            remaining_amount: parts.remaining_amount,
            refund_status: parts.refund_status,
            refund_reason: parts.refund_reason,
            notes: parts.notes,
            tags: parts.tags,
            lines: parts.lines.into_iter().map(LineItem::restore).collect(),
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Records a captured payment.
    ///
    /// Rejects non-positive amounts, captures against orders that no
    /// longer accept payment, and any capture that would push
    /// `paid_amount` past `total_amount` (no silent overpay).
    pub fn capture_payment(&mut self, amount: Money, method: &str) -> Result<(), OrderError> {
        if !amount.is_positive() {
            return Err(OrderError::invalid_payment(
                "payment amount must be positive",
            ));
        }
        if !self.status.accepts_payment() {
            return Err(OrderError::invalid_payment(format!(
                "order is {} and no longer accepts payments",
                self.status
            )));
        }

        let new_paid = self
            .paid_amount
            .checked_add(amount)
            .filter(|paid| *paid <= self.total_amount)
            .ok_or_else(|| {
                OrderError::invalid_payment(format!(
                    "capture of {amount} would exceed the order total of {}",
                    self.total_amount
                ))
            })?;

        self.paid_amount = new_paid;
        self.payment_method = Some(method.to_string());
        self.payment_status = if self.paid_amount == self.total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        self.finish_mutation();
        Ok(())
    }

    /// Moves the order to `next` along the status machine.
    ///
    /// The return states are reachable only through [`Order::refund_line`];
    /// requesting them here is an `InvalidTransition` even though the edge
    /// exists in the machine.
    pub fn change_status(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let from = self.status;
        let refund_only = matches!(
            next,
            OrderStatus::PartiallyReturned | OrderStatus::Returned
        );
        if refund_only || !from.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from, to: next });
        }

        self.status = next;
        self.finish_mutation();
        Ok(())
    }

    /// Records a return on one line and reconciles the order's refund
    /// state.
    ///
    /// Requires a fulfilled/completed (or partially returned) order whose
    /// payment state can still accept refunds; otherwise
    /// `InvalidRefundState`. Returns the refunded increment. `paid_amount`
    /// is never decreased; refunded value accumulates on the lines and in
    /// `refunded_total`.
    pub fn refund_line(
        &mut self,
        line_id: LineItemId,
        qty: Quantity,
        reason: &str,
    ) -> Result<Money, OrderError> {
        if !self.status.accepts_returns() || !self.payment_status.accepts_refunds() {
            return Err(OrderError::InvalidRefundState {
                status: self.status,
                payment_status: self.payment_status,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id() == line_id)
            .ok_or(OrderError::LineNotFound(line_id))?;

        let refunded = line.record_return(qty)?;

        let fully_returned = self.lines.iter().all(LineItem::fully_returned);
        self.refund_reason = Some(reason.to_string());
        if fully_returned {
            self.refund_status = Some(RefundStatus::Full);
            self.payment_status = PaymentStatus::Refunded;
            self.status = OrderStatus::Returned;
        } else {
            self.refund_status = Some(RefundStatus::Partial);
            self.payment_status = PaymentStatus::PartiallyRefunded;
            self.status = OrderStatus::PartiallyReturned;
        }
        self.finish_mutation();
        Ok(refunded)
    }

    /// Invoked at the end of every mutating operation: re-derives the
    /// outstanding balance and bumps `updated_at`.
    fn finish_mutation(&mut self) {
        self.remaining_amount = derive_remaining(self.total_amount, self.paid_amount);
        self.updated_at = Utc::now();
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn remaining_amount(&self) -> Money {
        self.remaining_amount
    }

    pub fn refund_status(&self) -> Option<RefundStatus> {
        self.refund_status
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// The order's line items, in creation order.
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Looks up a line item by ID.
    pub fn line(&self, line_id: LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|line| line.id() == line_id)
    }

    /// Sum of the refunded amounts across all lines.
    pub fn refunded_total(&self) -> Money {
        self.lines.iter().map(|line| line.refunded_amount()).sum()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Called by the store after a successful optimistic write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::DiscountSpec;
    use common::ItemId;

    fn widget_line(quantity: u32, unit_price_cents: i64) -> LineItem {
        LineItem::new(
            ItemId::new(),
            "Widget",
            Quantity::new(quantity),
            Money::from_cents(unit_price_cents),
            None,
        )
        .unwrap()
    }

    fn new_order(lines: Vec<LineItem>, tax_cents: i64, discount_cents: i64) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            order_number: "ORD-TEST-0001".to_string(),
            location_id: LocationId::new(),
            business_id: BusinessId::new(),
            customer: CustomerInfo::default(),
            order_date: Utc::now(),
            lines,
            tax_amount: Money::from_cents(tax_cents),
            discount_amount: Money::from_cents(discount_cents),
            payment_method: None,
            notes: None,
            tags: BTreeMap::new(),
        }
    }

    fn assert_totals_consistent(order: &Order) {
        assert_eq!(
            order.total_amount(),
            order.subtotal() + order.tax_amount() - order.discount_amount()
        );
        assert_eq!(
            order.remaining_amount(),
            order.total_amount() - order.paid_amount()
        );
        assert!(order.paid_amount() <= order.total_amount());
    }

    #[test]
    fn test_create_derives_totals() {
        // Worked example: 2 x 10.00 + 1 x 5.00, tax 1.50, no discount
        let order = Order::create(new_order(
            vec![widget_line(2, 1000), widget_line(1, 500)],
            150,
            0,
        ))
        .unwrap();

        assert_eq!(order.subtotal().cents(), 2500);
        assert_eq!(order.total_amount().cents(), 2650);
        assert_eq!(order.remaining_amount().cents(), 2650);
        assert_eq!(order.paid_amount(), Money::zero());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.version(), Version::first());
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_create_empty_order_fails() {
        let result = Order::create(new_order(vec![], 0, 0));
        assert!(matches!(result, Err(OrderError::EmptyOrder)));
    }

    #[test]
    fn test_create_negative_tax_fails() {
        let result = Order::create(new_order(vec![widget_line(1, 1000)], -1, 0));
        assert!(matches!(result, Err(OrderError::InvalidAdjustment { .. })));
    }

    #[test]
    fn test_create_discount_exceeding_total_fails() {
        let result = Order::create(new_order(vec![widget_line(1, 1000)], 100, 1101));
        assert!(matches!(result, Err(OrderError::InvalidAdjustment { .. })));
    }

    #[test]
    fn test_create_folds_line_discounts_into_order_discount() {
        let discounted = LineItem::new(
            ItemId::new(),
            "Widget",
            Quantity::new(2),
            Money::from_cents(1000),
            Some(DiscountSpec::Fixed(Money::from_cents(300))),
        )
        .unwrap();
        let order = Order::create(new_order(vec![discounted], 0, 200)).unwrap();

        assert_eq!(order.subtotal().cents(), 2000);
        assert_eq!(order.discount_amount().cents(), 500);
        assert_eq!(order.total_amount().cents(), 1500);
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_capture_partial_then_full() {
        let mut order = Order::create(new_order(vec![widget_line(2, 1000)], 0, 0)).unwrap();

        order.capture_payment(Money::from_cents(500), "cash").unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Partial);
        assert_eq!(order.paid_amount().cents(), 500);
        assert_eq!(order.remaining_amount().cents(), 1500);
        assert_totals_consistent(&order);

        order.capture_payment(Money::from_cents(1500), "card").unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.remaining_amount(), Money::zero());
        assert_eq!(order.payment_method(), Some("card"));
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_capture_overpay_rejected() {
        let mut order = Order::create(new_order(vec![widget_line(2, 1000)], 0, 0)).unwrap();
        order.capture_payment(Money::from_cents(1500), "cash").unwrap();

        let result = order.capture_payment(Money::from_cents(600), "cash");
        assert!(matches!(result, Err(OrderError::InvalidPayment { .. })));
        assert_eq!(order.paid_amount().cents(), 1500);
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_capture_non_positive_rejected() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        assert!(matches!(
            order.capture_payment(Money::zero(), "cash"),
            Err(OrderError::InvalidPayment { .. })
        ));
        assert!(matches!(
            order.capture_payment(Money::from_cents(-100), "cash"),
            Err(OrderError::InvalidPayment { .. })
        ));
    }

    #[test]
    fn test_capture_rejected_after_cancellation() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.change_status(OrderStatus::Cancelled).unwrap();

        let result = order.capture_payment(Money::from_cents(100), "cash");
        assert!(matches!(result, Err(OrderError::InvalidPayment { .. })));
    }

    #[test]
    fn test_status_walk_to_completed() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();
        order.change_status(OrderStatus::Completed).unwrap();
        assert!(order.status().is_terminal());
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_completed_to_pending_always_fails() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();
        order.change_status(OrderStatus::Completed).unwrap();

        let result = order.change_status(OrderStatus::Pending);
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Pending,
            })
        ));
    }

    #[test]
    fn test_fresh_order_can_cancel() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.change_status(OrderStatus::Cancelled).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_return_states_rejected_via_change_status() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();

        let result = order.change_status(OrderStatus::Returned);
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
    }

    #[test]
    fn test_refund_requires_fulfilled_and_paid() {
        let mut order = Order::create(new_order(vec![widget_line(2, 1000)], 0, 0)).unwrap();
        let line_id = order.lines()[0].id();

        // Pending order: wrong status
        let result = order.refund_line(line_id, Quantity::new(1), "damaged");
        assert!(matches!(result, Err(OrderError::InvalidRefundState { .. })));

        // Fulfilled but nothing paid: wrong payment state
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();
        let result = order.refund_line(line_id, Quantity::new(1), "damaged");
        assert!(matches!(result, Err(OrderError::InvalidRefundState { .. })));
    }

    #[test]
    fn test_partial_refund_scenario() {
        // Worked example from the reconciliation checklist
        let mut order = Order::create(new_order(
            vec![widget_line(2, 1000), widget_line(1, 500)],
            150,
            0,
        ))
        .unwrap();
        order.capture_payment(Money::from_cents(2650), "card").unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();

        let line_a = order.lines()[0].id();
        let refunded = order.refund_line(line_a, Quantity::new(1), "damaged").unwrap();

        assert_eq!(refunded.cents(), 1000);
        assert_eq!(order.line(line_a).unwrap().refunded_amount().cents(), 1000);
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(order.refund_status(), Some(RefundStatus::Partial));
        assert_eq!(order.status(), OrderStatus::PartiallyReturned);
        assert_eq!(order.refund_reason(), Some("damaged"));
        // paid_amount is untouched by refunds
        assert_eq!(order.paid_amount().cents(), 2650);
        assert_totals_consistent(&order);
    }

    #[test]
    fn test_full_refund_reaches_terminal_returned() {
        let mut order = Order::create(new_order(vec![widget_line(2, 1000)], 0, 0)).unwrap();
        order.capture_payment(Money::from_cents(2000), "card").unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();

        let line_id = order.lines()[0].id();
        order.refund_line(line_id, Quantity::new(1), "damaged").unwrap();
        assert_eq!(order.status(), OrderStatus::PartiallyReturned);

        order.refund_line(line_id, Quantity::new(1), "damaged").unwrap();
        assert_eq!(order.status(), OrderStatus::Returned);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(order.refund_status(), Some(RefundStatus::Full));
        assert_eq!(order.refunded_total().cents(), 2000);
        assert!(order.status().is_terminal());

        // No further returns once fully returned
        let result = order.refund_line(line_id, Quantity::new(1), "again");
        assert!(matches!(result, Err(OrderError::InvalidRefundState { .. })));
    }

    #[test]
    fn test_refund_unknown_line_fails() {
        let mut order = Order::create(new_order(vec![widget_line(1, 1000)], 0, 0)).unwrap();
        order.capture_payment(Money::from_cents(1000), "card").unwrap();
        order.change_status(OrderStatus::Confirmed).unwrap();
        order.change_status(OrderStatus::Fulfilled).unwrap();

        let result = order.refund_line(LineItemId::new(), Quantity::new(1), "damaged");
        assert!(matches!(result, Err(OrderError::LineNotFound(_))));
    }

    #[test]
    fn test_derive_remaining_is_pure() {
        assert_eq!(
            derive_remaining(Money::from_cents(2650), Money::from_cents(1000)).cents(),
            1650
        );
        assert_eq!(
            derive_remaining(Money::from_cents(2650), Money::from_cents(2650)),
            Money::zero()
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let order = Order::create(new_order(vec![widget_line(2, 1000)], 150, 0)).unwrap();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id(), order.id());
        assert_eq!(back.total_amount(), order.total_amount());
        assert_eq!(back.lines().len(), 1);
        // Monetary fields travel as decimal strings
        assert!(json.contains("\"21.50\""));
    }
}
