// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the first input value, so the series is
// defined at every position. Early values are biased toward the seed and only
// approach steady-state accuracy after several multiples of `period`; the
// recompute window policy accounts for that convergence horizon.

/// Compute the EMA series for `values` and look-back `period`.
///
/// The output always has the same length as the input; the first element
/// equals the first input value exactly.
///
/// # Edge cases
/// - empty input => empty vec
/// - `period == 0` => empty vec (division guard)
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &value in &values[1..] {
        let ema = value * multiplier + prev * (1.0 - multiplier);
        result.push(ema);
        prev = ema;
    }

    result
}
