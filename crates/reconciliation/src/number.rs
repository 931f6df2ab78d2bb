//! Order-number generation policy.
//!
//! Numbers are sequential per business and day. Uniqueness is enforced by
//! the store; on a collision the caller advances the sequence and retries,
//! bounded by `max_attempts`.

use chrono::NaiveDate;
use common::BusinessId;

/// Configurable order-number policy.
#[derive(Debug, Clone)]
pub struct OrderNumberPolicy {
    /// How many leading hex characters of the business ID go into the
    /// number.
    pub prefix_len: usize,

    /// How many candidate numbers to try before giving up with
    /// `OrderNumberExhausted`.
    pub max_attempts: u32,
}

impl Default for OrderNumberPolicy {
    fn default() -> Self {
        Self {
            prefix_len: 6,
            max_attempts: 5,
        }
    }
}

impl OrderNumberPolicy {
    /// Formats the candidate number for the given business/day/sequence,
    /// e.g. `ORD-9F21AC-20260807-0042`.
    pub fn candidate(&self, business_id: BusinessId, day: NaiveDate, sequence: u32) -> String {
        let hex = business_id.as_uuid().simple().to_string();
        let prefix: String = hex.chars().take(self.prefix_len).collect();
        format!(
            "ORD-{}-{}-{:04}",
            prefix.to_uppercase(),
            day.format("%Y%m%d"),
            sequence
        )
    }
}
