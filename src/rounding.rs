//! Half-up (away from zero) rounding for reported figures.
//!
//! Binary floats cannot represent most decimal midpoints, so values are
//! converted through their shortest decimal representation before rounding:
//! `1234567.895` rounds to `1234567.90` even though the nearest `f64` is
//! slightly below the midpoint.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Round `value` to `decimals` places, with midpoints rounded away from zero.
///
/// Non-finite values are returned unchanged.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let rounded = to_rounded_decimal(value, decimals)
        .and_then(|decimal| decimal.to_string().parse::<f64>().ok());

    match rounded {
        Some(rounded) => rounded,
        None => {
            // Outside the range of `Decimal`, `f64::round` already rounds half away from zero.
            let factor = 10f64.powi(decimals as i32);
            (value * factor).round() / factor
        }
    }
}

/// Round `value` half-up and fix the scale to exactly `decimals` places.
///
/// Returns `None` for non-finite values and for values `Decimal` cannot hold.
pub(crate) fn to_rounded_decimal(value: f64, decimals: u32) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }

    let decimal = Decimal::from_str(&value.to_string()).ok()?;
    let mut rounded =
        decimal.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);

    Some(rounded)
}

#[cfg(test)]
mod tests {
    use super::{round_half_up, to_rounded_decimal};

    #[test]
    fn midpoints_round_away_from_zero() {
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(-0.125, 2), -0.13);
        assert_eq!(round_half_up(2.5, 0), 3.0);
        assert_eq!(round_half_up(-2.5, 0), -3.0);
    }

    #[test]
    fn decimal_midpoints_not_representable_in_binary_round_up() {
        assert_eq!(round_half_up(2.675, 2), 2.68);
        assert_eq!(round_half_up(1234567.895, 2), 1234567.9);
    }

    #[test]
    fn repeating_fractions_round_to_nearest() {
        assert_eq!(round_half_up(-33.333333333333336, 2), -33.33);
        assert_eq!(round_half_up(66.66666666666667, 2), 66.67);
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert!(round_half_up(f64::NAN, 2).is_nan());
        assert_eq!(round_half_up(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn rounded_decimal_has_fixed_scale() {
        let decimal = to_rounded_decimal(5.0, 2).unwrap();

        assert_eq!(decimal.to_string(), "5.00");
    }
}
