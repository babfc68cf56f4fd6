use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::{IndicatorStore, PriceStore};
use crate::types::{IndicatorPoint, Interval, PriceBar};

type PriceKey = (String, Interval, u32);
type IndicatorKey = (String, Interval);

// ---------------------------------------------------------------------------
// MemoryPriceStore -- thread-safe bar series per (symbol, interval, market)
// ---------------------------------------------------------------------------

/// In-memory price bar store. BTreeMaps keyed by bar timestamp give
/// ascending iteration and timestamp uniqueness for free.
#[derive(Default)]
pub struct MemoryPriceStore {
    series: RwLock<HashMap<PriceKey, BTreeMap<i64, PriceBar>>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed bars into the store (ingestion stand-in). Bars replace any
    /// existing bar at the same timestamp.
    pub fn insert_bars(&self, bars: impl IntoIterator<Item = PriceBar>) {
        let mut series = self.series.write();
        for bar in bars {
            let key = (bar.symbol.clone(), bar.interval, bar.market_id);
            series.entry(key).or_default().insert(bar.unix, bar);
        }
    }

    pub fn bar_count(&self, symbol: &str, interval: Interval, market_id: u32) -> usize {
        let series = self.series.read();
        series
            .get(&(symbol.to_string(), interval, market_id))
            .map_or(0, BTreeMap::len)
    }
}

impl PriceStore for MemoryPriceStore {
    fn get_ascending(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let series = self.series.read();
        Ok(series
            .get(&(symbol.to_string(), interval, market_id))
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_latest(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<Option<PriceBar>, StoreError> {
        let series = self.series.read();
        Ok(series
            .get(&(symbol.to_string(), interval, market_id))
            .and_then(|map| map.values().next_back().cloned()))
    }

    fn get_latest_n(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
        n: usize,
        ascending: bool,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let series = self.series.read();
        let mut bars: Vec<PriceBar> = series
            .get(&(symbol.to_string(), interval, market_id))
            .map(|map| map.values().rev().take(n).cloned().collect())
            .unwrap_or_default();
        // Collected newest-first; flip for ascending callers.
        if ascending {
            bars.reverse();
        }
        Ok(bars)
    }
}

// ---------------------------------------------------------------------------
// MemoryIndicatorStore -- thread-safe point series per (symbol, interval)
// ---------------------------------------------------------------------------

/// In-memory indicator point store. Upsert takes the write lock once, so a
/// point is replaced wholesale with no partially written state visible to
/// readers.
#[derive(Default)]
pub struct MemoryIndicatorStore {
    series: RwLock<HashMap<IndicatorKey, BTreeMap<i64, IndicatorPoint>>>,
}

impl MemoryIndicatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points for a key.
    #[cfg(test)]
    pub fn point_count(&self, symbol: &str, interval: Interval) -> usize {
        let series = self.series.read();
        series
            .get(&(symbol.to_string(), interval))
            .map_or(0, BTreeMap::len)
    }

    /// All stored points for a key, ascending by timestamp.
    pub fn get_all(&self, symbol: &str, interval: Interval) -> Vec<IndicatorPoint> {
        let series = self.series.read();
        series
            .get(&(symbol.to_string(), interval))
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl IndicatorStore for MemoryIndicatorStore {
    fn get_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<IndicatorPoint>, StoreError> {
        let series = self.series.read();
        Ok(series
            .get(&(symbol.to_string(), interval))
            .and_then(|map| map.values().next_back().cloned()))
    }

    fn upsert(&self, point: IndicatorPoint) -> Result<(), StoreError> {
        let mut series = self.series.write();
        let key = (point.symbol.clone(), point.interval);
        series.entry(key).or_default().insert(point.unix, point);
        Ok(())
    }

    fn delete_all(&self, symbol: &str, interval: Interval) -> Result<usize, StoreError> {
        let mut series = self.series.write();
        Ok(series
            .remove(&(symbol.to_string(), interval))
            .map_or(0, |map| map.len()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
