// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Polaris indicator engine: the tracked
// symbol/interval grid, indicator look-back periods, and the recompute window
// policy all live here so that warm-up tuning is a single-point change.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Interval, SeriesKey};
use crate::window::WindowPolicy;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTC/USD".to_string()]
}

fn default_intervals() -> Vec<Interval> {
    vec![
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
    ]
}

fn default_market_id() -> u32 {
    1
}

fn default_refresh_secs() -> u64 {
    300
}

fn default_ma_short_period() -> usize {
    20
}

fn default_ma_long_period() -> usize {
    50
}

fn default_macd_short_period() -> usize {
    12
}

fn default_macd_long_period() -> usize {
    26
}

fn default_macd_signal_period() -> usize {
    9
}

fn default_rsi_period() -> usize {
    14
}

fn default_stoch_fast_k() -> usize {
    14
}

fn default_stoch_slow() -> usize {
    3
}

fn default_kdj_fast_k() -> usize {
    9
}

fn default_kdj_smoothing() -> usize {
    3
}

fn default_ema_channel_period() -> usize {
    33
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Look-back periods for every transform the engine maintains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Short simple moving average window.
    #[serde(default = "default_ma_short_period")]
    pub ma_short_period: usize,

    /// Long simple moving average window.
    #[serde(default = "default_ma_long_period")]
    pub ma_long_period: usize,

    /// MACD fast EMA period.
    #[serde(default = "default_macd_short_period")]
    pub macd_short_period: usize,

    /// MACD slow EMA period. Dominates the convergence buffer sizing.
    #[serde(default = "default_macd_long_period")]
    pub macd_long_period: usize,

    /// MACD signal-line EMA period.
    #[serde(default = "default_macd_signal_period")]
    pub macd_signal_period: usize,

    /// RSI delta window.
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Stochastic raw %K high/low window.
    #[serde(default = "default_stoch_fast_k")]
    pub stoch_fast_k: usize,

    /// Stochastic slow %K smoothing.
    #[serde(default = "default_stoch_slow")]
    pub stoch_slow_k: usize,

    /// Stochastic %D smoothing.
    #[serde(default = "default_stoch_slow")]
    pub stoch_slow_d: usize,

    /// KDJ RSV high/low window.
    #[serde(default = "default_kdj_fast_k")]
    pub kdj_fast_k: usize,

    /// KDJ K smoothing period (factor 1/period).
    #[serde(default = "default_kdj_smoothing")]
    pub kdj_k_period: usize,

    /// KDJ D smoothing period (factor 1/period).
    #[serde(default = "default_kdj_smoothing")]
    pub kdj_d_period: usize,

    /// EMA channel period applied to close, high and low.
    #[serde(default = "default_ema_channel_period")]
    pub ema_channel_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_short_period: default_ma_short_period(),
            ma_long_period: default_ma_long_period(),
            macd_short_period: default_macd_short_period(),
            macd_long_period: default_macd_long_period(),
            macd_signal_period: default_macd_signal_period(),
            rsi_period: default_rsi_period(),
            stoch_fast_k: default_stoch_fast_k(),
            stoch_slow_k: default_stoch_slow(),
            stoch_slow_d: default_stoch_slow(),
            kdj_fast_k: default_kdj_fast_k(),
            kdj_k_period: default_kdj_smoothing(),
            kdj_d_period: default_kdj_smoothing(),
            ema_channel_period: default_ema_channel_period(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level runtime configuration for the Polaris engine.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Symbols whose derived series are maintained.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Bar intervals maintained per symbol.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<Interval>,

    /// Market the price bars are read from.
    #[serde(default = "default_market_id")]
    pub market_id: u32,

    /// Cadence of the periodic update-all sweep, in seconds. 0 disables it.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Look-back periods for every maintained transform.
    #[serde(default)]
    pub indicator_params: IndicatorParams,

    /// Recompute window sizing.
    #[serde(default)]
    pub window: WindowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            intervals: default_intervals(),
            market_id: default_market_id(),
            refresh_secs: default_refresh_secs(),
            indicator_params: IndicatorParams::default(),
            window: WindowPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            intervals = ?config.intervals,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// The full (symbol, interval) grid the engine maintains.
    pub fn series_keys(&self) -> Vec<SeriesKey> {
        let mut keys = Vec::with_capacity(self.symbols.len() * self.intervals.len());
        for symbol in &self.symbols {
            for &interval in &self.intervals {
                keys.push(SeriesKey::new(symbol.clone(), interval));
            }
        }
        keys
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbols, vec!["BTC/USD"]);
        assert_eq!(cfg.intervals.len(), 4);
        assert_eq!(cfg.market_id, 1);
        assert_eq!(cfg.refresh_secs, 300);
        assert_eq!(cfg.indicator_params.ma_short_period, 20);
        assert_eq!(cfg.indicator_params.ma_long_period, 50);
        assert_eq!(cfg.indicator_params.macd_long_period, 26);
        assert_eq!(cfg.indicator_params.ema_channel_period, 33);
        assert_eq!(cfg.window.convergence_buffer, 260);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbols, vec!["BTC/USD"]);
        assert_eq!(cfg.indicator_params.rsi_period, 14);
        assert_eq!(cfg.window.convergence_buffer, 260);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["ETH/USD"], "intervals": ["1h"], "refresh_secs": 60 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["ETH/USD"]);
        assert_eq!(cfg.intervals, vec![Interval::OneHour]);
        assert_eq!(cfg.refresh_secs, 60);
        assert_eq!(cfg.indicator_params.kdj_fast_k, 9);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbols, cfg2.symbols);
        assert_eq!(cfg.intervals, cfg2.intervals);
        assert_eq!(cfg.window.convergence_buffer, cfg2.window.convergence_buffer);
    }

    #[test]
    fn series_keys_is_symbol_interval_grid() {
        let cfg = EngineConfig {
            symbols: vec!["BTC/USD".into(), "ETH/USD".into()],
            intervals: vec![Interval::OneHour, Interval::OneDay],
            ..EngineConfig::default()
        };
        let keys = cfg.series_keys();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&SeriesKey::new("ETH/USD", Interval::OneDay)));
    }
}
