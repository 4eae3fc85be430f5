//! Tolerant floating-point comparison.

/// Compare two floating-point values with a relative tolerance.
///
/// Exactly equal values (including equal infinities) are always equal. When
/// either value is zero, or the values are extremely close, the relative
/// error is meaningless and the absolute difference is compared against
/// `epsilon * f64::MIN_POSITIVE` instead. Otherwise the difference relative
/// to the combined magnitude must be below `epsilon`. `NaN` is never equal.
pub fn nearly_equal(a: f64, b: f64, epsilon: f64) -> bool {
    if a == b {
        return true;
    }

    let diff = (a - b).abs();
    if a == 0.0 || b == 0.0 || diff < f64::MIN_POSITIVE {
        diff < epsilon * f64::MIN_POSITIVE
    } else {
        diff / (a.abs() + b.abs()) < epsilon
    }
}
