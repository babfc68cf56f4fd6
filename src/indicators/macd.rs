// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line      = EMA(short) - EMA(long)
//   signal    = EMA(signal_period) of line
//   histogram = line - signal
//
// Because the EMAs are seeded from the first value, all three series are
// numerically present from position 0 but only trustworthy once the long EMA
// has converged. Consumers that persist a recomputed tail rely on the window
// policy's convergence buffer for that guarantee.

use crate::indicators::ema::calculate_ema;

/// The three MACD component series, each aligned to the input length.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Compute MACD over `values` with the given EMA periods.
///
/// Returns empty series for empty input or a zero period.
pub fn calculate_macd(
    values: &[f64],
    short_period: usize,
    long_period: usize,
    signal_period: usize,
) -> MacdSeries {
    if values.is_empty() || short_period == 0 || long_period == 0 || signal_period == 0 {
        return MacdSeries {
            line: Vec::new(),
            signal: Vec::new(),
            histogram: Vec::new(),
        };
    }

    let short_ema = calculate_ema(values, short_period);
    let long_ema = calculate_ema(values, long_period);

    let line: Vec<f64> = short_ema
        .iter()
        .zip(long_ema.iter())
        .map(|(s, l)| s - l)
        .collect();

    let signal = calculate_ema(&line, signal_period);

    let histogram: Vec<f64> = line
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}
