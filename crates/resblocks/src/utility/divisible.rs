//! # Channel Rounding

/// Round a channel count to a multiple of `divisor`.
///
/// The result is at least `divisor`, and is never more than 10% below
/// the requested value.
///
/// ```text
/// new_v = max(divisor, floor(v + divisor / 2) // divisor * divisor)
/// if new_v < 0.9 * v: new_v += divisor
/// ```
///
/// # Panics
///
/// If `divisor` is zero.
pub fn make_divisible(
    value: f64,
    divisor: usize,
) -> usize {
    assert!(divisor > 0, "divisor must be > 0");

    let half = divisor as f64 / 2.0;
    let rounded = ((value + half).floor() as usize) / divisor * divisor;
    let mut new_value = rounded.max(divisor);

    if (new_value as f64) < 0.9 * value {
        new_value += divisor;
    }
    new_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_divisible() {
        assert_eq!(make_divisible(32.0, 8), 32);
        assert_eq!(make_divisible(36.0, 8), 40);
        assert_eq!(make_divisible(35.0, 8), 32);
        assert_eq!(make_divisible(3.0, 8), 8);
        assert_eq!(make_divisible(16.0 * 6.0, 8), 96);
        assert_eq!(make_divisible(24.0 * 4.5, 8), 112);
    }

    #[test]
    fn test_make_divisible_never_drops_below_ninety_percent() {
        for v in 1..512 {
            let out = make_divisible(v as f64, 8);
            assert_eq!(out % 8, 0);
            assert!(out as f64 >= 0.9 * v as f64, "{v} -> {out}");
        }
    }
}
