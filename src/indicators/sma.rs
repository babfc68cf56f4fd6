// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the trailing `period` values. The first `period - 1`
// positions have no full window and stay undefined.

/// Compute the SMA series for `values` and look-back `period`.
///
/// The output has the same length as the input; positions without a full
/// trailing window are `None`.
///
/// # Edge cases
/// - `period == 0` => all `None` (no meaningful window exists)
/// - `values.len() < period` => all `None`
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut result = vec![None; values.len()];
    if values.len() < period {
        return result;
    }

    // Rolling sum instead of re-summing each window.
    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        result[i] = Some(sum / period as f64);
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_empty_input() {
        assert!(calculate_sma(&[], 5).is_empty());
    }

    #[test]
    fn sma_period_zero() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn sma_insufficient_data() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 5), vec![None, None]);
    }

    #[test]
    fn sma_defined_count() {
        // Length L input has exactly L - period + 1 defined values.
        let values: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let sma = calculate_sma(&values, 5);
        assert_eq!(sma.len(), 20);
        assert_eq!(sma.iter().filter(|v| v.is_some()).count(), 16);
        assert!(sma[..4].iter().all(Option::is_none));
    }

    #[test]
    fn sma_window_means() {
        let values: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let sma = calculate_sma(&values, 3);
        for i in 2..values.len() {
            let expected = (values[i] + values[i - 1] + values[i - 2]) / 3.0;
            let got = sma[i].expect("defined from period-1 on");
            assert!((got - expected).abs() < 1e-9, "at {i}: {got} vs {expected}");
        }
    }

    #[test]
    fn sma_constant_series() {
        let values = vec![100.0; 60];
        let sma = calculate_sma(&values, 20);
        for v in sma.iter().flatten() {
            assert!((v - 100.0).abs() < 1e-9);
        }
    }
}
