// =============================================================================
// Relative Strength Index (RSI) — trailing simple averages
// =============================================================================
//
// Each price delta is classified as a gain or a loss (the other side counts
// as zero). Gains and losses are averaged over the trailing `period` deltas:
//
//   RS  = avg_gain / avg_loss
//   RSI = 100 - 100 / (1 + RS)
//
// A zero average loss (pure uptrend, or a completely flat window) reports
// RSI = 100 rather than propagating a division by zero.

/// Compute the RSI series for `values` and look-back `period`.
///
/// The output has the same length as the input; the first `period` positions
/// are `None` (a full window of `period` deltas is needed).
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `values.len() <= period` => all `None`
/// - zero average loss => `100.0`
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return result;
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // RSI at position i consumes the `period` deltas ending at delta i-1.
    for i in period..values.len() {
        let window = &deltas[i - period..i];
        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else if d < 0.0 {
                (g, l + d.abs())
            } else {
                (g, l)
            }
        });

        let avg_gain = sum_gain / period as f64;
        let avg_loss = sum_loss / period as f64;

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };

        result[i] = Some(rsi);
    }

    result
}
