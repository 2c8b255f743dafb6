//! Fixed-point decimal helpers
//!
//! Every value that feeds sizing or P&L is an 18.8 fixed-point decimal.
//! Rounding is always round-half-even at 8 fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits kept for prices, sizes and P&L
pub const SCALE: u32 = 8;

/// Maximum number of integer digits
pub const INTEGER_DIGITS: u32 = 18;

/// Exclusive upper bound on magnitude (10^18)
pub fn max_magnitude() -> Decimal {
    Decimal::from(10u64.pow(INTEGER_DIGITS))
}

/// Round to the fixed 8-digit scale (round-half-even)
pub fn fixed(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven);
    if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    }
}

/// Whether a value fits in 18 integer digits
pub fn in_range(value: Decimal) -> bool {
    value.abs() < max_magnitude()
}

/// Render a value with exactly 8 fractional digits
///
/// Two decimals that are numerically equal after rounding always render
/// identically, whatever scale they were parsed with.
pub fn canonical(value: Decimal) -> String {
    let mut v = fixed(value);
    v.rescale(SCALE);
    v.to_string()
}
