// =============================================================================
// Recompute Engine — initialize / update / delete orchestration
// =============================================================================
//
// Coordinates fetch -> compute -> merge for each derived series. Every
// operation is idempotent with respect to the stores: initialize refuses to
// touch an already-populated key, update rewrites a converged tail with
// values a full recompute would also produce, and delete removes the key
// wholesale. The engine holds no cross-invocation cache; each operation
// re-derives its state from the stores.

use std::fmt;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{error, info, warn};

use crate::config::IndicatorParams;
use crate::error::EngineError;
use crate::indicators::{compute_all, IndicatorVector};
use crate::store::{IndicatorStore, PriceStore};
use crate::types::{IndicatorPoint, Interval, PriceBar, SeriesKey};
use crate::window::WindowPolicy;

// =============================================================================
// RecomputeOutcome
// =============================================================================

/// Reportable result of one engine operation. Report-and-return conditions
/// (already initialized, nothing to update, ...) are outcomes, not errors;
/// only store and input failures surface as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Initialized { points: usize },
    AlreadyInitialized,
    NoPriceData,
    NothingToUpdate,
    Updated { written: usize, window: usize, gap: usize },
    Deleted { count: usize },
    NotFound,
}

impl RecomputeOutcome {
    /// Whether the operation wrote fresh points worth notifying about.
    pub fn wrote_points(&self) -> bool {
        matches!(
            self,
            Self::Initialized { .. } | Self::Updated { .. }
        )
    }
}

impl fmt::Display for RecomputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized { points } => write!(f, "initialized {points} indicator points"),
            Self::AlreadyInitialized => write!(f, "already initialized; nothing to do"),
            Self::NoPriceData => write!(f, "no price bars available; nothing to compute"),
            Self::NothingToUpdate => write!(f, "no prior indicator points; nothing to update"),
            Self::Updated { written, window, gap } => {
                write!(f, "updated {written} points from a {window}-bar window (gap {gap})")
            }
            Self::Deleted { count } => write!(f, "deleted {count} indicator points"),
            Self::NotFound => write!(f, "no indicator points found"),
        }
    }
}

// =============================================================================
// RecomputeEngine
// =============================================================================

/// The orchestrator tying the window policy, the transforms and the stores
/// together.
pub struct RecomputeEngine {
    price_store: Arc<dyn PriceStore>,
    indicator_store: Arc<dyn IndicatorStore>,
    params: IndicatorParams,
    window: WindowPolicy,
}

impl RecomputeEngine {
    pub fn new(
        price_store: Arc<dyn PriceStore>,
        indicator_store: Arc<dyn IndicatorStore>,
        params: IndicatorParams,
        window: WindowPolicy,
    ) -> Self {
        Self {
            price_store,
            indicator_store,
            params,
            window,
        }
    }

    /// Bulk backfill: compute and persist the full history for a key.
    ///
    /// A no-op when any indicator point already exists for the key, so
    /// repeated initialize commands cannot corrupt an existing series.
    pub fn initialize(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<RecomputeOutcome, EngineError> {
        if self.indicator_store.get_latest(symbol, interval)?.is_some() {
            info!(symbol, interval = %interval, "initialize skipped; indicators already present");
            return Ok(RecomputeOutcome::AlreadyInitialized);
        }

        let bars = self.price_store.get_ascending(symbol, interval, market_id)?;
        if bars.is_empty() {
            info!(symbol, interval = %interval, "initialize skipped; no price history");
            return Ok(RecomputeOutcome::NoPriceData);
        }

        let vectors = compute_all(&bars, &self.params);
        let points = self.persist_slice(&bars, &vectors, 0)?;

        info!(symbol, interval = %interval, points, "series initialized from full history");
        Ok(RecomputeOutcome::Initialized { points })
    }

    /// Incremental tail recompute.
    ///
    /// Fetches `gap + convergence buffer` trailing bars, recomputes every
    /// transform over that window, and persists only the converged tail.
    /// Fails fast (report, no mutation) when the key has no price bars or no
    /// prior indicator point.
    pub fn update(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<RecomputeOutcome, EngineError> {
        let Some(latest_bar) = self.price_store.get_latest(symbol, interval, market_id)? else {
            info!(symbol, interval = %interval, "update skipped; no price bars");
            return Ok(RecomputeOutcome::NoPriceData);
        };

        let Some(latest_point) = self.indicator_store.get_latest(symbol, interval)? else {
            info!(symbol, interval = %interval, "update skipped; series not initialized");
            return Ok(RecomputeOutcome::NothingToUpdate);
        };

        let gap = self
            .window
            .gap_bars(latest_bar.unix, latest_point.unix, interval);
        let required = self.window.required_bars(gap);

        let bars = self
            .price_store
            .get_latest_n(symbol, interval, market_id, required, true)?;
        if bars.is_empty() {
            return Ok(RecomputeOutcome::NoPriceData);
        }

        let vectors = compute_all(&bars, &self.params);

        // When the store held fewer bars than requested the recompute spans
        // the entire available history, so every point is as converged as it
        // can get and the whole window is persisted.
        let trim = if bars.len() < required {
            warn!(
                symbol,
                interval = %interval,
                fetched = bars.len(),
                required,
                "window shorter than the convergence buffer; persisting full recompute"
            );
            0
        } else {
            self.window.trim_start().min(bars.len())
        };

        let written = self.persist_slice(&bars, &vectors, trim)?;

        info!(
            symbol,
            interval = %interval,
            gap,
            window = bars.len(),
            written,
            "series updated"
        );
        Ok(RecomputeOutcome::Updated {
            written,
            window: bars.len(),
            gap,
        })
    }

    /// Remove every stored point for a key.
    pub fn delete(&self, symbol: &str, interval: Interval) -> Result<RecomputeOutcome, EngineError> {
        let count = self.indicator_store.delete_all(symbol, interval)?;
        if count == 0 {
            info!(symbol, interval = %interval, "delete found no indicator points");
            return Ok(RecomputeOutcome::NotFound);
        }
        info!(symbol, interval = %interval, count, "indicator series deleted");
        Ok(RecomputeOutcome::Deleted { count })
    }

    /// Update when the series exists, otherwise initialize it. Used by the
    /// startup sweep so a fresh deployment backfills itself.
    pub fn ensure(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<RecomputeOutcome, EngineError> {
        if self.indicator_store.get_latest(symbol, interval)?.is_some() {
            self.update(symbol, interval, market_id)
        } else {
            self.initialize(symbol, interval, market_id)
        }
    }

    /// Sequential update fan-out over a key set. A failing key is logged and
    /// skipped; it never aborts the remaining keys, and there is no global
    /// rollback. Each key's consistency is independent.
    pub fn update_all(
        &self,
        keys: &[SeriesKey],
        market_id: u32,
    ) -> Vec<(SeriesKey, Result<RecomputeOutcome, EngineError>)> {
        keys.iter()
            .map(|key| {
                let result = self.update(&key.symbol, key.interval, market_id);
                if let Err(e) = &result {
                    error!(key = %key, error = %e, "update failed; continuing with remaining keys");
                }
                (key.clone(), result)
            })
            .collect()
    }

    /// `ensure` across a key set, same failure isolation as `update_all`.
    pub fn ensure_all(
        &self,
        keys: &[SeriesKey],
        market_id: u32,
    ) -> Vec<(SeriesKey, Result<RecomputeOutcome, EngineError>)> {
        keys.iter()
            .map(|key| {
                let result = self.ensure(&key.symbol, key.interval, market_id);
                if let Err(e) = &result {
                    error!(key = %key, error = %e, "ensure failed; continuing with remaining keys");
                }
                (key.clone(), result)
            })
            .collect()
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Upsert every point from `start` to the end of the computed window.
    /// Each point is replaced wholesale; mixed-window field patching is not
    /// possible by construction.
    fn persist_slice(
        &self,
        bars: &[PriceBar],
        vectors: &[IndicatorVector],
        start: usize,
    ) -> Result<usize, EngineError> {
        let mut written = 0;
        for (bar, vector) in bars.iter().zip(vectors.iter()).skip(start) {
            self.indicator_store.upsert(make_point(bar, vector))?;
            written += 1;
        }
        Ok(written)
    }
}

/// Join a bar's identity with its computed vector into a stored point.
fn make_point(bar: &PriceBar, vector: &IndicatorVector) -> IndicatorPoint {
    IndicatorPoint {
        unix: bar.unix,
        timestamp: Utc
            .timestamp_opt(bar.unix, 0)
            .single()
            .unwrap_or(bar.timestamp),
        symbol: bar.symbol.clone(),
        interval: bar.interval,
        volume: vector.volume,
        ma_short: vector.ma_short,
        ma_long: vector.ma_long,
        macd: vector.macd,
        signal: vector.signal,
        histogram: vector.histogram,
        rsi: vector.rsi,
        stoch_k: vector.stoch_k,
        stoch_d: vector.stoch_d,
        ema_close: vector.ema_close,
        ema_high: vector.ema_high,
        ema_low: vector.ema_low,
        kdj_k: vector.kdj_k,
        kdj_d: vector.kdj_d,
        kdj_j: vector.kdj_j,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryIndicatorStore, MemoryPriceStore};

    const HOUR: i64 = 3_600;
    const BASE_UNIX: i64 = 1_700_000_000;

    fn wave_bar(i: usize) -> PriceBar {
        let unix = BASE_UNIX + i as i64 * HOUR;
        let close = 100.0 + (i as f64 * 0.05).sin() * 10.0;
        PriceBar {
            unix,
            timestamp: Utc.timestamp_opt(unix, 0).unwrap(),
            symbol: "BTC/USD".into(),
            interval: Interval::OneHour,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 42.0,
            market_id: 1,
        }
    }

    struct Fixture {
        price: Arc<MemoryPriceStore>,
        indicator: Arc<MemoryIndicatorStore>,
        engine: RecomputeEngine,
    }

    fn fixture() -> Fixture {
        let price = Arc::new(MemoryPriceStore::new());
        let indicator = Arc::new(MemoryIndicatorStore::new());
        let engine = RecomputeEngine::new(
            price.clone(),
            indicator.clone(),
            IndicatorParams::default(),
            WindowPolicy::default(),
        );
        Fixture {
            price,
            indicator,
            engine,
        }
    }

    #[test]
    fn initialize_backfills_full_history() {
        let f = fixture();
        f.price.insert_bars((0..300).map(wave_bar));

        let outcome = f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::Initialized { points: 300 });
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 300);

        // Warm-up prefix keeps its unknowns.
        let all = f.indicator.get_all("BTC/USD", Interval::OneHour);
        assert!(all[0].ma_short.is_none());
        assert!(all[0].rsi.is_none());
        assert!(all[299].ma_long.is_some());
    }

    #[test]
    fn initialize_is_noop_when_points_exist() {
        let f = fixture();
        f.price.insert_bars((0..300).map(wave_bar));
        f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();

        let before = f.indicator.get_all("BTC/USD", Interval::OneHour);
        let outcome = f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::AlreadyInitialized);
        assert_eq!(f.indicator.get_all("BTC/USD", Interval::OneHour), before);
    }

    #[test]
    fn initialize_without_bars_reports_no_data() {
        let f = fixture();
        let outcome = f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::NoPriceData);
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 0);
    }

    #[test]
    fn update_fails_fast_without_prior_points() {
        let f = fixture();
        f.price.insert_bars((0..300).map(wave_bar));

        let outcome = f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::NothingToUpdate);
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 0);
    }

    #[test]
    fn update_fails_fast_without_bars() {
        let f = fixture();
        let outcome = f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::NoPriceData);
    }

    #[test]
    fn update_fills_gap_and_matches_full_recompute() {
        let f = fixture();
        f.price.insert_bars((0..600).map(wave_bar));
        f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();

        // Ten new bars arrive after the backfill.
        f.price.insert_bars((600..610).map(wave_bar));
        let outcome = f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        match outcome {
            RecomputeOutcome::Updated { gap, window, written } => {
                assert_eq!(gap, 10);
                assert_eq!(window, 270);
                assert_eq!(written, 270 - 234);
            }
            other => panic!("expected Updated, got {other:?}"),
        }

        // Every bar now has a point, and the tail agrees with a from-scratch
        // recompute of the full history.
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 610);

        let bars: Vec<PriceBar> = (0..610).map(wave_bar).collect();
        let full = compute_all(&bars, &IndicatorParams::default());
        let stored = f.indicator.get_all("BTC/USD", Interval::OneHour);
        let last = stored.last().unwrap();
        let reference = &full[609];
        assert!((last.macd.unwrap() - reference.macd.unwrap()).abs() < 1e-6);
        assert!((last.signal.unwrap() - reference.signal.unwrap()).abs() < 1e-6);
        assert!((last.rsi.unwrap() - reference.rsi.unwrap()).abs() < 1e-9);
        assert!((last.ma_long.unwrap() - reference.ma_long.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn update_twice_without_new_bars_is_idempotent() {
        let f = fixture();
        f.price.insert_bars((0..600).map(wave_bar));
        f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();

        f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        let first = f.indicator.get_all("BTC/USD", Interval::OneHour);

        f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        let second = f.indicator.get_all("BTC/USD", Interval::OneHour);

        assert_eq!(first, second);
    }

    #[test]
    fn update_on_short_history_persists_full_recompute() {
        let f = fixture();
        f.price.insert_bars((0..50).map(wave_bar));
        f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();

        f.price.insert_bars((50..55).map(wave_bar));
        let outcome = f.engine.update("BTC/USD", Interval::OneHour, 1).unwrap();
        match outcome {
            RecomputeOutcome::Updated { written, window, .. } => {
                assert_eq!(window, 55);
                assert_eq!(written, 55);
            }
            other => panic!("expected Updated, got {other:?}"),
        }
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 55);
    }

    #[test]
    fn delete_reports_count_then_not_found() {
        let f = fixture();
        f.price.insert_bars((0..100).map(wave_bar));
        f.engine.initialize("BTC/USD", Interval::OneHour, 1).unwrap();

        assert_eq!(
            f.engine.delete("BTC/USD", Interval::OneHour).unwrap(),
            RecomputeOutcome::Deleted { count: 100 }
        );
        assert_eq!(
            f.engine.delete("BTC/USD", Interval::OneHour).unwrap(),
            RecomputeOutcome::NotFound
        );
        assert_eq!(f.indicator.point_count("BTC/USD", Interval::OneHour), 0);
    }

    #[test]
    fn ensure_initializes_then_updates() {
        let f = fixture();
        f.price.insert_bars((0..300).map(wave_bar));

        let first = f.engine.ensure("BTC/USD", Interval::OneHour, 1).unwrap();
        assert!(matches!(first, RecomputeOutcome::Initialized { .. }));

        let second = f.engine.ensure("BTC/USD", Interval::OneHour, 1).unwrap();
        assert!(matches!(second, RecomputeOutcome::Updated { .. }));
    }

    // ── update_all failure isolation ────────────────────────────────────

    /// Price store that fails for one poisoned symbol and delegates the rest.
    struct PoisonedPriceStore {
        inner: MemoryPriceStore,
        poisoned: String,
    }

    impl PoisonedPriceStore {
        fn check(&self, symbol: &str) -> Result<(), StoreError> {
            if symbol == self.poisoned {
                return Err(StoreError::Backend("connection reset".into()));
            }
            Ok(())
        }
    }

    impl PriceStore for PoisonedPriceStore {
        fn get_ascending(
            &self,
            symbol: &str,
            interval: Interval,
            market_id: u32,
        ) -> Result<Vec<PriceBar>, StoreError> {
            self.check(symbol)?;
            self.inner.get_ascending(symbol, interval, market_id)
        }

        fn get_latest(
            &self,
            symbol: &str,
            interval: Interval,
            market_id: u32,
        ) -> Result<Option<PriceBar>, StoreError> {
            self.check(symbol)?;
            self.inner.get_latest(symbol, interval, market_id)
        }

        fn get_latest_n(
            &self,
            symbol: &str,
            interval: Interval,
            market_id: u32,
            n: usize,
            ascending: bool,
        ) -> Result<Vec<PriceBar>, StoreError> {
            self.check(symbol)?;
            self.inner.get_latest_n(symbol, interval, market_id, n, ascending)
        }
    }

    #[test]
    fn update_all_continues_past_failing_key() {
        let inner = MemoryPriceStore::new();
        inner.insert_bars((0..300).map(wave_bar));
        let eth_bars = (0..300).map(|i| PriceBar {
            symbol: "ETH/USD".into(),
            ..wave_bar(i)
        });
        inner.insert_bars(eth_bars);

        let price = Arc::new(PoisonedPriceStore {
            inner,
            poisoned: "BTC/USD".into(),
        });
        let indicator = Arc::new(MemoryIndicatorStore::new());
        let engine = RecomputeEngine::new(
            price,
            indicator.clone(),
            IndicatorParams::default(),
            WindowPolicy::default(),
        );

        engine.initialize("ETH/USD", Interval::OneHour, 1).unwrap();

        let keys = vec![
            SeriesKey::new("BTC/USD", Interval::OneHour),
            SeriesKey::new("ETH/USD", Interval::OneHour),
        ];
        let results = engine.update_all(&keys, 1);

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert!(matches!(
            results[1].1.as_ref().unwrap(),
            RecomputeOutcome::Updated { .. }
        ));
    }
}
