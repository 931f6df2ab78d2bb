//! Value objects for the order domain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a decimal money string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount {input:?}: {reason}")]
pub struct ParseMoneyError {
    pub input: String,
    pub reason: &'static str,
}

/// Monetary amount with exactly two fractional digits, backed by integer
/// cents so arithmetic is exact.
///
/// Serializes as a decimal string (`"26.50"`), never as a binary float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from whole major units (10 -> 10.00).
    pub fn from_major(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds another amount, failing on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Subtracts another amount, failing if the result would be negative.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        let cents = self.cents.checked_sub(other.cents)?;
        (cents >= 0).then_some(Money::from_cents(cents))
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: Quantity) -> Money {
        Money {
            cents: self.cents * i64::from(quantity.get()),
        }
    }

    /// Returns `self * numerator / denominator` in integer cents, rounded
    /// toward zero. Used for refund proration; the intermediate product is
    /// widened to avoid overflow.
    pub fn prorate(&self, numerator: u32, denominator: u32) -> Money {
        debug_assert!(denominator > 0);
        let scaled = i128::from(self.cents) * i128::from(numerator) / i128::from(denominator);
        Money {
            cents: scaled as i64,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::str::FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseMoneyError {
            input: s.to_string(),
            reason,
        };

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err("expected decimal digits"));
        }
        if frac.len() > 2 {
            return Err(err("at most two fractional digits"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err("expected decimal digits"));
        }

        let whole: i64 = whole.parse().map_err(|_| err("amount out of range"))?;
        let mut frac_cents: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| err("amount out of range"))?
        };
        if frac.len() == 1 {
            frac_cents *= 10;
        }

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(|| err("amount out of range"))?;

        Ok(Money {
            cents: if negative { -cents } else { cents },
        })
    }
}

impl Serialize for Money {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Non-negative count of units on a line item.
///
/// Subtraction is checked; there is no way to drive a quantity below zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    /// Creates a quantity.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw count.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Returns true if the quantity is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds another quantity, failing on overflow.
    pub fn checked_add(&self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// Subtracts another quantity, failing if the result would go below zero.
    pub fn checked_sub(&self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}
