//! Test helpers for statistical assertions on sampled trajectories.

/// Assert that `observed` events out of `total` trials match
/// `expected_probability` within `tolerance` (absolute, on the rate).
///
/// # Panics
///
/// Panics when the observed rate falls outside the tolerated band.
#[allow(clippy::cast_precision_loss)]
pub fn assert_rate_within(
    observed: usize,
    total: usize,
    expected_probability: f64,
    tolerance: f64,
    context: &str,
) {
    let rate = observed as f64 / total as f64;
    assert!(
        (rate - expected_probability).abs() <= tolerance,
        "{context}: observed rate {rate:.4} deviates from expected \
         {expected_probability:.4} by more than {tolerance:.2}"
    );
}
