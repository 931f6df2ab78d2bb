//! Request types accepted by the reconciliation service.
//!
//! Mirrors what an HTTP (or other) caller supplies; mapping from wire DTOs
//! happens field by field in the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::ItemId;
use domain::{CustomerInfo, DiscountSpec, Money};

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct LineRequest {
    /// The catalog item to sell.
    pub item_id: ItemId,

    /// Units requested; must be positive.
    pub quantity: u32,

    /// Optional price override; when absent the catalog price at creation
    /// time is snapshotted.
    pub unit_price: Option<Money>,

    /// Optional line-level discount.
    pub discount: Option<DiscountSpec>,
}

impl LineRequest {
    /// Creates a line request at the catalog price.
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity,
            unit_price: None,
            discount: None,
        }
    }

    /// Overrides the unit price.
    pub fn with_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// Attaches a line-level discount.
    pub fn with_discount(mut self, discount: DiscountSpec) -> Self {
        self.discount = Some(discount);
        self
    }
}

/// A request to create an order from a cart of line items.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer: CustomerInfo,
    pub lines: Vec<LineRequest>,
    pub tax_amount: Money,
    pub discount_amount: Money,
    /// Defaults to the current time when absent.
    pub order_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl CreateOrderRequest {
    /// Creates a request with no adjustments or customer details.
    pub fn new(lines: Vec<LineRequest>) -> Self {
        Self {
            customer: CustomerInfo::default(),
            lines,
            tax_amount: Money::zero(),
            discount_amount: Money::zero(),
            order_date: None,
            payment_method: None,
            notes: None,
            tags: BTreeMap::new(),
        }
    }

    /// Sets the order-level tax amount.
    pub fn with_tax(mut self, tax_amount: Money) -> Self {
        self.tax_amount = tax_amount;
        self
    }

    /// Sets the order-level discount amount.
    pub fn with_discount(mut self, discount_amount: Money) -> Self {
        self.discount_amount = discount_amount;
        self
    }

    /// Sets the customer contact details.
    pub fn with_customer(mut self, customer: CustomerInfo) -> Self {
        self.customer = customer;
        self
    }
}
