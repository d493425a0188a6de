//! Integer arithmetic and time helpers shared across the control core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Floor division (toward negative infinity), matching the quantization
/// formulas that subtract before dividing. `b` must be positive here.
#[inline]
pub fn div_floor_i64(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0, "div_floor_i64 expects a positive divisor");
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Round to the nearest multiple of ten with ties to even tens
/// (`round(n, -1)` semantics of the original firmware).
#[inline]
pub fn round_tens_ties_even(n: i64) -> i64 {
    let q = div_floor_i64(n, 10);
    let r = n - q * 10;
    let up = match r.cmp(&5) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => q & 1 != 0,
    };
    (q + i64::from(up)) * 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_floor_matches_python_floordiv() {
        assert_eq!(div_floor_i64(7, 2), 3);
        assert_eq!(div_floor_i64(-7, 2), -4);
        assert_eq!(div_floor_i64(-6, 2), -3);
        assert_eq!(div_floor_i64(0, 5), 0);
        assert_eq!(div_floor_i64(-1, 1400), -1);
    }

    #[test]
    fn round_tens_matches_python_round() {
        // Python round() uses banker's rounding on exact ties.
        assert_eq!(round_tens_ties_even(15), 20);
        assert_eq!(round_tens_ties_even(25), 20);
        assert_eq!(round_tens_ties_even(14), 10);
        assert_eq!(round_tens_ties_even(16), 20);
        assert_eq!(round_tens_ties_even(-15), -20);
        assert_eq!(round_tens_ties_even(-25), -20);
        assert_eq!(round_tens_ties_even(0), 0);
        assert_eq!(round_tens_ties_even(99), 100);
    }
}
