//! # Probability Checks

/// Check that a value is a probability in ``[0, 1]``.
///
/// # Returns
///
/// The input value.
///
/// # Panics
///
/// If the value is outside ``[0, 1]``, or is not finite.
#[inline(always)]
pub fn expect_probability(prob: f64) -> f64 {
    assert!(
        prob.is_finite() && (0.0..=1.0).contains(&prob),
        "Expected a probability in [0, 1], got: {prob}"
    );
    prob
}

/// Check that a value is a keep probability in ``(0, 1]``.
///
/// A keep probability of ``0`` would drop every sample and divide by zero.
///
/// # Panics
///
/// If the value is outside ``(0, 1]``.
#[inline(always)]
pub fn expect_keep_probability(keep_prob: f64) -> f64 {
    let keep_prob = expect_probability(keep_prob);
    assert!(keep_prob > 0.0, "Keep probability must be > 0, got: {keep_prob}");
    keep_prob
}
