// =============================================================================
// Shared types used across the Polaris indicator engine
// =============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// =============================================================================
// Interval
// =============================================================================

/// Supported bar durations. Each variant maps to a fixed number of seconds
/// and a short wire label ("1h", "1d", ...). Ordered shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Interval {
    pub const ALL: [Self; 7] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
        Self::OneWeek,
    ];

    /// Bar duration in seconds. Timestamp gaps divided by this give bar counts.
    pub const fn secs(self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::OneHour => 3_600,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
            Self::OneWeek => 604_800,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "4h" => Ok(Self::FourHours),
            "1d" => Ok(Self::OneDay),
            "1w" => Ok(Self::OneWeek),
            other => Err(EngineError::InvalidInput(format!(
                "unknown interval: {other} (expected one of {})",
                Self::ALL.map(Self::label).join(", ")
            ))),
        }
    }
}

// =============================================================================
// SeriesKey
// =============================================================================

/// Composite key identifying one derived series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// =============================================================================
// PriceBar
// =============================================================================

/// A single OHLCV observation. Bars are produced by an external ingestion
/// process and are read-only from the engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub unix: i64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub interval: Interval,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub market_id: u32,
}

/// Which column of a bar feeds a transform. The transforms only ever consume
/// these columns; asking for anything else is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    High,
    Low,
    Close,
    Volume,
}

/// Extract one column from an ascending bar slice.
pub fn extract_series(bars: &[PriceBar], field: PriceField) -> Vec<f64> {
    bars.iter()
        .map(|b| match field {
            PriceField::High => b.high,
            PriceField::Low => b.low,
            PriceField::Close => b.close,
            PriceField::Volume => b.volume,
        })
        .collect()
}

// =============================================================================
// IndicatorPoint
// =============================================================================

/// The full derived vector aligned to one price bar.
///
/// Every derived field is `Option<f64>`: `None` means the statistic had
/// insufficient history at that position and must stay unknown, never
/// coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub unix: i64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub interval: Interval,
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
