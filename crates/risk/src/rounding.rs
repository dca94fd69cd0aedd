//! Price and volume normalisation, done in `Decimal` so prices written with a
//! few decimals (101.045) round the way they read.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Shortest decimal that reads back as `value`: `0.1_f64` becomes `0.1`, not
/// `0.1000000000000000055511151231`. `None` for NaN, infinities and values
/// outside `Decimal`'s range.
pub fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Nearest `f64` to `value`, so `1.33` comes back as the literal `1.33`.
pub fn to_f64(value: Decimal) -> Option<f64> {
    value
        .normalize()
        .to_string()
        .parse::<f64>()
        .ok()
        .or_else(|| value.to_f64())
}

/// Round to `digits` decimal places, half away from zero.
/// Example: `101.045` at 2 digits → `101.05`, `-2.5` at 0 digits → `-3`.
pub fn round_price(price: Decimal, digits: u32) -> Decimal {
    price.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
}

/// Round DOWN to the nearest multiple of `step`.
/// Example: `amount=1.3333, step=0.01` → `1.33`.
pub fn floor_to_step(amount: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return amount;
    }
    match amount.checked_div(step) {
        Some(steps) => steps.floor() * step,
        None => amount,
    }
}

/// True if `amount` is a whole number of `step`s.
pub fn is_step_multiple(amount: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return true;
    }
    amount
        .checked_rem(step)
        .is_some_and(|rem| rem.is_zero())
}

/// `round_price` for plain `f64` prices. Values `Decimal` cannot hold come
/// back unchanged.
pub fn round_to_digits(value: f64, digits: u32) -> f64 {
    to_decimal(value)
        .and_then(|d| to_f64(round_price(d, digits)))
        .unwrap_or(value)
}
