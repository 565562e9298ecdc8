//! Rational timing types for exact cycle arithmetic
//!
//! Pattern positions are rationals measured in cycles, so nested fast/slow
//! and long-running transports stay drift-free.

use num_rational::Ratio;
use num_traits::ToPrimitive;

/// Exact time point in cycles from the pattern origin.
/// Uses i64 for large numerator/denominator support.
pub type Time = Ratio<i64>;

/// Helper to create Time from a ratio n/d
#[inline]
pub fn time(n: i64, d: i64) -> Time {
    Ratio::new(n, d)
}

/// Create Time from an integer (whole cycles)
#[inline]
pub fn cycles(n: i64) -> Time {
    Ratio::from_integer(n)
}

/// Convert rational to f64 for clock math
#[inline]
pub fn to_f64(t: Time) -> f64 {
    t.to_f64().unwrap_or(0.0)
}

/// Convert rational to f32 for audio-facing output
#[inline]
pub fn to_f32(t: Time) -> f32 {
    t.to_f32().unwrap_or(0.0)
}

/// Convert f64 to approximate Time (for user-supplied transform factors)
/// Uses a fixed denominator for reasonable precision
pub fn from_f64(f: f64) -> Time {
    // Denominator of 9600 (LCM of common musical divisions: 24, 32, 48, etc.)
    let denom = 9600i64;
    let numer = (f * denom as f64).round() as i64;
    Ratio::new(numer, denom)
}

/// The whole cycle a time point falls in
#[inline]
pub fn floor_cycles(t: Time) -> i64 {
    t.floor().to_integer()
}

/// Smallest whole-cycle boundary at or after a time point
#[inline]
pub fn ceil_cycles(t: Time) -> i64 {
    t.ceil().to_integer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_creation() {
        let t = time(1, 3);
        assert_eq!(*t.numer(), 1);
        assert_eq!(*t.denom(), 3);
    }

    #[test]
    fn test_time_arithmetic() {
        let a = time(1, 3);
        let b = time(1, 6);
        assert_eq!(a + b, time(1, 2)); // 1/3 + 1/6 = 1/2
    }

    #[test]
    fn test_from_f64_roundtrip() {
        let t = from_f64(0.5);
        assert_eq!(to_f64(t), 0.5);
    }

    #[test]
    fn test_from_f64_is_exact_for_common_factors() {
        assert_eq!(from_f64(2.0), cycles(2));
        assert_eq!(from_f64(1.5), time(3, 2));
        assert_eq!(from_f64(0.25), time(1, 4));
    }

    #[test]
    fn test_floor_ceil_cycles() {
        assert_eq!(floor_cycles(time(5, 4)), 1);
        assert_eq!(ceil_cycles(time(5, 4)), 2);
        assert_eq!(ceil_cycles(cycles(2)), 2);
    }
}
