//! A single line of an order: one catalog item, its price snapshot, and
//! its return/refund tracking.

use common::{ItemId, LineItemId};
use serde::{Deserialize, Serialize};

use super::{DiscountType, Money, OrderError, Quantity};

/// A line-level discount as supplied at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountSpec {
    /// Flat amount off the line's gross subtotal.
    Fixed(Money),
    /// Percentage (0..=100) off the line's gross subtotal.
    Percent(u8),
}

/// One line of an order.
///
/// `unit_price` and `subtotal` are snapshots taken at order creation and
/// never re-read from the catalog. Returns accumulate in
/// `returned_quantity`/`refunded_amount`; the snapshots stay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    id: LineItemId,
    item_id: ItemId,
    name: String,
    quantity: Quantity,
    unit_price: Money,
    subtotal: Money,
    discount_amount: Money,
    discount_type: Option<DiscountType>,
    returned_quantity: Quantity,
    refunded_amount: Money,
}

/// Raw field set used to rehydrate a stored line item.
///
/// Construction from user input goes through [`LineItem::new`], which
/// validates; `restore` trusts the store.
#[derive(Debug, Clone)]
pub struct LineItemParts {
    pub id: LineItemId,
    pub item_id: ItemId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub discount_type: Option<DiscountType>,
    pub returned_quantity: Quantity,
    pub refunded_amount: Money,
}

impl LineItem {
    /// Creates a validated line item with its price snapshot.
    ///
    /// Fails with `InvalidLineItem` when the quantity is zero, the unit
    /// price is negative, or the discount exceeds the line's gross value.
    pub fn new(
        item_id: ItemId,
        name: impl Into<String>,
        quantity: Quantity,
        unit_price: Money,
        discount: Option<DiscountSpec>,
    ) -> Result<Self, OrderError> {
        if quantity.is_zero() {
            return Err(OrderError::invalid_line_item("quantity must be positive"));
        }
        if unit_price.is_negative() {
            return Err(OrderError::invalid_line_item(
                "unit price must not be negative",
            ));
        }

        let subtotal = unit_price.multiply(quantity);
        let (discount_amount, discount_type) = match discount {
            None => (Money::zero(), None),
            Some(DiscountSpec::Fixed(amount)) => {
                if amount.is_negative() || amount > subtotal {
                    return Err(OrderError::invalid_line_item(
                        "discount must be between zero and the line subtotal",
                    ));
                }
                (amount, Some(DiscountType::Fixed))
            }
            Some(DiscountSpec::Percent(pct)) => {
                if pct > 100 {
                    return Err(OrderError::invalid_line_item(
                        "percent discount must be between 0 and 100",
                    ));
                }
                (
                    subtotal.prorate(u32::from(pct), 100),
                    Some(DiscountType::Percent),
                )
            }
        };

        Ok(Self {
            id: LineItemId::new(),
            item_id,
            name: name.into(),
            quantity,
            unit_price,
            subtotal,
            discount_amount,
            discount_type,
            returned_quantity: Quantity::new(0),
            refunded_amount: Money::zero(),
        })
    }

    /// Rehydrates a line item from storage without validation.
    pub fn restore(parts: LineItemParts) -> Self {
        Self {
            id: parts.id,
            item_id: parts.item_id,
            name: parts.name,
            quantity: parts.quantity,
            unit_price: parts.unit_price,
            subtotal: parts.subtotal,
            discount_amount: parts.discount_amount,
            discount_type: parts.discount_type,
            returned_quantity: parts.returned_quantity,
            refunded_amount: parts.refunded_amount,
        }
    }

    /// Records a return of `qty` units and prorates the refund.
    ///
    /// The cumulative refund target after the return is
    /// `net_subtotal * returned / quantity` (integer cents, rounded toward
    /// zero); the returned value is the increment over what was already
    /// refunded, so a fully returned line always refunds exactly its net
    /// value regardless of rounding along the way.
    pub(super) fn record_return(&mut self, qty: Quantity) -> Result<Money, OrderError> {
        if qty.is_zero() {
            return Err(OrderError::invalid_return(
                "return quantity must be positive",
            ));
        }
        let returnable = self
            .quantity
            .checked_sub(self.returned_quantity)
            .ok_or_else(|| OrderError::InvalidQuantity {
                reason: "returned quantity exceeds line quantity".to_string(),
            })?;
        let new_returned = match self.returned_quantity.checked_add(qty) {
            Some(total) if qty <= returnable => total,
            _ => {
                return Err(OrderError::invalid_return(format!(
                    "cannot return {qty} units, only {returnable} remain returnable"
                )));
            }
        };

        let target = self
            .net_subtotal()
            .prorate(new_returned.get(), self.quantity.get());
        let increment = target - self.refunded_amount;

        self.returned_quantity = new_returned;
        self.refunded_amount = target;
        Ok(increment)
    }

    /// Refundable value of the line: gross subtotal minus discount.
    pub fn net_subtotal(&self) -> Money {
        self.subtotal - self.discount_amount
    }

    /// Returns true once every unit has been returned.
    pub fn fully_returned(&self) -> bool {
        self.returned_quantity == self.quantity
    }

    pub fn id(&self) -> LineItemId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn discount_type(&self) -> Option<DiscountType> {
        self.discount_type
    }

    pub fn returned_quantity(&self) -> Quantity {
        self.returned_quantity
    }

    pub fn refunded_amount(&self) -> Money {
        self.refunded_amount
    }
}
