use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be a finite number")]
    NotFinite,
    #[error("amount must not be negative")]
    Negative,
    #[error("amount {0} does not fit in minor units")]
    Overflow(String),
}

/// Parse a JSON-style float into an exact decimal using its shortest round-trip form,
/// so `19.99` becomes `19.99` rather than its binary expansion.
pub fn decimal_from_f64(value: f64) -> Result<BigDecimal, MoneyError> {
    if !value.is_finite() {
        return Err(MoneyError::NotFinite);
    }
    BigDecimal::from_str(&value.to_string()).map_err(|_| MoneyError::NotFinite)
}

/// Convert a major-unit price into minor units (cents), rounding half-up.
pub fn to_minor_units(price: &BigDecimal) -> Result<i64, MoneyError> {
    if *price < BigDecimal::from(0) {
        return Err(MoneyError::Negative);
    }
    let scaled = price.clone() * BigDecimal::from(100);
    let whole = scaled.with_scale(0);
    let remainder = &scaled - &whole;
    let half = BigDecimal::new(5.into(), 1);
    let rounded = if remainder >= half { whole + BigDecimal::from(1) } else { whole };
    rounded
        .to_i64()
        .ok_or_else(|| MoneyError::Overflow(price.to_string()))
}

/// `round(price * 100)` for prices carried as JSON numbers.
pub fn minor_units_from_f64(price: f64) -> Result<i64, MoneyError> {
    to_minor_units(&decimal_from_f64(price)?)
}
