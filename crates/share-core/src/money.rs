//! Minor-unit conversion
//!
//! Fees are stored as decimal dollars; the payment provider works in cents.
//! The conversion happens once, server-side, from the booking's fee snapshot.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{BookingError, Result};

/// Default settlement currency (Australian dollars)
pub const DEFAULT_CURRENCY: &str = "aud";

/// Convert a decimal amount to whole minor units, rounding half away from zero
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| BookingError::invalid_field("amount", format!("{amount} is out of range")))
}

/// Whether a provider-reported amount matches what was charged for this payment
pub fn amounts_match(expected: Decimal, received_minor: i64) -> bool {
    to_minor_units(expected).is_ok_and(|cents| cents == received_minor)
}
