// =============================================================================
// KDJ — stochastic variant with exponentially smoothed K and D
// =============================================================================
//
// RSV locates the close inside the trailing `fast_k` high/low window (like
// raw %K). K and D are exponential smoothings of RSV with factor 1/period,
// seeded at the first defined RSV position:
//
//   K_i = (1 - 1/k_period) * K_{i-1} + (1/k_period) * RSV_i
//   D_i = (1 - 1/d_period) * D_{i-1} + (1/d_period) * K_i
//   J_i = 3 * K_i - 2 * D_i
//
// The first `fast_k - 1` positions have no RSV window and stay undefined.

/// The K, D and J series, aligned to the input length.
#[derive(Debug, Clone, PartialEq)]
pub struct KdjSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub j: Vec<Option<f64>>,
}

/// Compute KDJ over aligned high/low/close series.
///
/// Mismatched or empty inputs produce empty output; a zero period produces
/// all-`None` series. A zero high-low range emits the neutral RSV 50.0.
pub fn calculate_kdj(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    fast_k: usize,
    k_period: usize,
    d_period: usize,
) -> KdjSeries {
    let len = closes.len();
    if len == 0 || highs.len() != len || lows.len() != len {
        return KdjSeries {
            k: Vec::new(),
            d: Vec::new(),
            j: Vec::new(),
        };
    }
    if fast_k == 0 || k_period == 0 || d_period == 0 || len < fast_k {
        return KdjSeries {
            k: vec![None; len],
            d: vec![None; len],
            j: vec![None; len],
        };
    }

    // RSV over the trailing fast_k-bar window, defined from index fast_k - 1.
    let mut rsv = vec![0.0; len];
    for i in (fast_k - 1)..len {
        let window = (i + 1 - fast_k)..=i;
        let hh = highs[window.clone()]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let ll = lows[window].iter().cloned().fold(f64::INFINITY, f64::min);
        let range = hh - ll;
        rsv[i] = if range == 0.0 {
            50.0
        } else {
            (closes[i] - ll) / range * 100.0
        };
    }

    let mut k = vec![None; len];
    let mut d = vec![None; len];
    let mut j = vec![None; len];

    let seed = fast_k - 1;
    let mut prev_k = rsv[seed];
    let mut prev_d = prev_k;
    k[seed] = Some(prev_k);
    d[seed] = Some(prev_d);
    j[seed] = Some(3.0 * prev_k - 2.0 * prev_d);

    let k_factor = 1.0 / k_period as f64;
    let d_factor = 1.0 / d_period as f64;

    for i in fast_k..len {
        let cur_k = (1.0 - k_factor) * prev_k + k_factor * rsv[i];
        let cur_d = (1.0 - d_factor) * prev_d + d_factor * cur_k;
        k[i] = Some(cur_k);
        d[i] = Some(cur_d);
        j[i] = Some(3.0 * cur_k - 2.0 * cur_d);
        prev_k = cur_k;
        prev_d = cur_d;
    }

    KdjSeries { k, d, j }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let closes: Vec<f64> = (1..=n).map(|x| x as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        (highs, lows, closes)
    }

    #[test]
    fn kdj_empty_input() {
        let out = calculate_kdj(&[], &[], &[], 9, 3, 3);
        assert!(out.k.is_empty());
    }

    #[test]
    fn kdj_insufficient_data() {
        let (highs, lows, closes) = series(5);
        let out = calculate_kdj(&highs, &lows, &closes, 9, 3, 3);
        assert!(out.k.iter().all(Option::is_none));
        assert!(out.j.iter().all(Option::is_none));
    }

    #[test]
    fn kdj_undefined_first_eight_positions() {
        let (highs, lows, closes) = series(30);
        let out = calculate_kdj(&highs, &lows, &closes, 9, 3, 3);
        assert_eq!(out.k.len(), 30);
        assert!(out.k[..8].iter().all(Option::is_none));
        assert!(out.k[8..].iter().all(Option::is_some));
        assert!(out.d[8..].iter().all(Option::is_some));
        assert!(out.j[8..].iter().all(Option::is_some));
    }

    #[test]
    fn kdj_seed_equals_rsv() {
        // At the seed position K = D = RSV, so J = 3K - 2D = K as well.
        let (highs, lows, closes) = series(12);
        let out = calculate_kdj(&highs, &lows, &closes, 9, 3, 3);
        let k = out.k[8].unwrap();
        let d = out.d[8].unwrap();
        let j = out.j[8].unwrap();
        assert!((k - d).abs() < 1e-9);
        assert!((j - k).abs() < 1e-9);
    }

    #[test]
    fn kdj_j_identity() {
        let (highs, lows, closes) = series(40);
        let out = calculate_kdj(&highs, &lows, &closes, 9, 3, 3);
        for i in 8..40 {
            let expected = 3.0 * out.k[i].unwrap() - 2.0 * out.d[i].unwrap();
            assert!((out.j[i].unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn kdj_flat_series_is_neutral() {
        let highs = vec![100.0; 30];
        let lows = vec![100.0; 30];
        let closes = vec![100.0; 30];
        let out = calculate_kdj(&highs, &lows, &closes, 9, 3, 3);
        for v in out.k.iter().flatten().chain(out.d.iter().flatten()) {
            assert!((v - 50.0).abs() < 1e-9);
        }
    }
}
