// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the derived series maintained by
// the recompute engine. Every transform is deterministic and aligns its
// output 1:1 with the input sequence, padding positions that lack sufficient
// lookback with `None` instead of fabricating values.

pub mod ema;
pub mod kdj;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

use crate::config::IndicatorParams;
use crate::types::{extract_series, PriceBar, PriceField};

/// The full derived vector for one bar position, before it is joined with the
/// bar's identity into an `IndicatorPoint`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorVector {
    pub volume: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub ema_close: Option<f64>,
    pub ema_high: Option<f64>,
    pub ema_low: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
}

/// Run every transform over an ascending bar window and assemble one
/// `IndicatorVector` per bar.
///
/// Determinism of the underlying transforms means the same window always
/// yields the same vectors, which is what makes a repeated recompute a
/// stored no-op.
pub fn compute_all(bars: &[PriceBar], params: &IndicatorParams) -> Vec<IndicatorVector> {
    if bars.is_empty() {
        return Vec::new();
    }

    let closes = extract_series(bars, PriceField::Close);
    let highs = extract_series(bars, PriceField::High);
    let lows = extract_series(bars, PriceField::Low);
    let volumes = extract_series(bars, PriceField::Volume);

    let ma_short = sma::calculate_sma(&closes, params.ma_short_period);
    let ma_long = sma::calculate_sma(&closes, params.ma_long_period);

    let macd = macd::calculate_macd(
        &closes,
        params.macd_short_period,
        params.macd_long_period,
        params.macd_signal_period,
    );

    let rsi = rsi::calculate_rsi(&closes, params.rsi_period);

    let stoch = stochastic::calculate_stochastic(
        &highs,
        &lows,
        &closes,
        params.stoch_fast_k,
        params.stoch_slow_k,
        params.stoch_slow_d,
    );

    let ema_close = ema::calculate_ema(&closes, params.ema_channel_period);
    let ema_high = ema::calculate_ema(&highs, params.ema_channel_period);
    let ema_low = ema::calculate_ema(&lows, params.ema_channel_period);

    let kdj = kdj::calculate_kdj(
        &highs,
        &lows,
        &closes,
        params.kdj_fast_k,
        params.kdj_k_period,
        params.kdj_d_period,
    );

    (0..bars.len())
        .map(|i| IndicatorVector {
            volume: Some(volumes[i]),
            ma_short: ma_short[i],
            ma_long: ma_long[i],
            macd: macd.line.get(i).copied(),
            signal: macd.signal.get(i).copied(),
            histogram: macd.histogram.get(i).copied(),
            rsi: rsi[i],
            stoch_k: stoch.k[i],
            stoch_d: stoch.d[i],
            ema_close: ema_close.get(i).copied(),
            ema_high: ema_high.get(i).copied(),
            ema_low: ema_low.get(i).copied(),
            kdj_k: kdj.k[i],
            kdj_d: kdj.d[i],
            kdj_j: kdj.j[i],
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;
    use chrono::{TimeZone, Utc};

    fn constant_bars(n: usize, close: f64) -> Vec<PriceBar> {
        (0..n)
            .map(|i| {
                let unix = 1_700_000_000 + i as i64 * 3_600;
                PriceBar {
                    unix,
                    timestamp: Utc.timestamp_opt(unix, 0).unwrap(),
                    symbol: "BTC/USD".into(),
                    interval: Interval::OneHour,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 5.0,
                    market_id: 1,
                }
            })
            .collect()
    }

    #[test]
    fn compute_all_empty_bars() {
        assert!(compute_all(&[], &IndicatorParams::default()).is_empty());
    }

    #[test]
    fn compute_all_aligned_to_bars() {
        let bars = constant_bars(120, 100.0);
        let out = compute_all(&bars, &IndicatorParams::default());
        assert_eq!(out.len(), 120);
    }

    #[test]
    fn compute_all_constant_price_scenario() {
        // 100 flat bars: every defined moving average equals the price, the
        // MACD family is zero throughout, and RSI reports 100 under the
        // zero-average-loss rule.
        let bars = constant_bars(100, 100.0);
        let out = compute_all(&bars, &IndicatorParams::default());

        for v in &out {
            if let Some(ma) = v.ma_short {
                assert!((ma - 100.0).abs() < 1e-9);
            }
            if let Some(ma) = v.ma_long {
                assert!((ma - 100.0).abs() < 1e-9);
            }
            assert!(v.macd.unwrap().abs() < 1e-9);
            assert!(v.signal.unwrap().abs() < 1e-9);
            assert!(v.histogram.unwrap().abs() < 1e-9);
            if let Some(rsi) = v.rsi {
                assert!((rsi - 100.0).abs() < 1e-9);
            }
            assert!((v.ema_close.unwrap() - 100.0).abs() < 1e-9);
        }

        // Warm-up padding is preserved, not zero-filled.
        assert!(out[0].ma_short.is_none());
        assert!(out[0].rsi.is_none());
        assert!(out[18].ma_short.is_none());
        assert!(out[19].ma_short.is_some());
        assert!(out[48].ma_long.is_none());
        assert!(out[49].ma_long.is_some());
    }

    #[test]
    fn compute_all_copies_volume() {
        let bars = constant_bars(10, 100.0);
        let out = compute_all(&bars, &IndicatorParams::default());
        assert_eq!(out[3].volume, Some(5.0));
    }
}
