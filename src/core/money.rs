//! Amount handling shared by every ledger write.
//!
//! Amounts are `f64` yuan. They are rounded to cents when they enter the
//! system, and every limit comparison is made on cent-rounded values so that
//! binary float noise can neither admit nor reject a payment.

use crate::errors::{Error, Result};

/// Rounds an amount to two decimal places.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Validates a transactional amount (payment, deduction, expense): finite and
/// strictly positive once rounded to cents.
pub fn validate_positive_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    let rounded = round_cents(amount);
    if rounded <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(rounded)
}

/// Validates an owed amount: finite and not negative.
pub fn validate_owed_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(round_cents(amount))
}

/// True when `total` is above `limit` at cent precision.
#[must_use]
pub fn exceeds(total: f64, limit: f64) -> bool {
    round_cents(total) > round_cents(limit)
}
