// =============================================================================
// Stochastic Oscillator (%K / %D)
// =============================================================================
//
// Raw %K locates the close inside the trailing `fast_k` high/low range:
//
//   raw = (close - lowest_low) / (highest_high - lowest_low) * 100
//
// Slow %K is an SMA(slow_k) of raw; %D is an SMA(slow_d) of slow %K.
// Positions without enough lookback are explicitly `None`, never left as raw
// garbage or zeroed.

/// The smoothed %K and %D series, aligned to the input length.
#[derive(Debug, Clone, PartialEq)]
pub struct StochSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Compute the stochastic oscillator over aligned high/low/close series.
///
/// All three inputs must have the same length; mismatched or empty inputs
/// produce empty output. A window whose high equals its low (no range at all)
/// emits the neutral value 50.0 instead of dividing by zero.
pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    fast_k: usize,
    slow_k: usize,
    slow_d: usize,
) -> StochSeries {
    let len = closes.len();
    if len == 0 || highs.len() != len || lows.len() != len {
        return StochSeries {
            k: Vec::new(),
            d: Vec::new(),
        };
    }
    if fast_k == 0 || slow_k == 0 || slow_d == 0 {
        return StochSeries {
            k: vec![None; len],
            d: vec![None; len],
        };
    }

    // Raw %K, defined from index fast_k - 1.
    let mut raw = vec![None; len];
    for i in (fast_k - 1)..len {
        let window = (i + 1 - fast_k)..=i;
        let hh = highs[window.clone()]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let ll = lows[window].iter().cloned().fold(f64::INFINITY, f64::min);
        let range = hh - ll;
        raw[i] = Some(if range == 0.0 {
            50.0
        } else {
            (closes[i] - ll) / range * 100.0
        });
    }

    let k = smooth(&raw, slow_k);
    let d = smooth(&k, slow_d);

    StochSeries { k, d }
}

/// SMA over an Option series: defined only where the full trailing window is
/// defined.
fn smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    for i in (period.saturating_sub(1))..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(Option::is_some) {
            let sum: f64 = window.iter().flatten().sum();
            result[i] = Some(sum / period as f64);
        }
    }
    result
}
