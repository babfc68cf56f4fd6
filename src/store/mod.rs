// =============================================================================
// Store seams — price bars in, indicator points out
// =============================================================================
//
// The engine reads bars from a `PriceStore` and maintains points in an
// `IndicatorStore`. Both are synchronous from the orchestrator's viewpoint;
// timeout and cancellation policy belongs to the backing client, not here.
// Relational backends live behind these traits and outside this crate; the
// in-memory implementation below backs tests and store-less deployments.

pub mod memory;

pub use memory::{MemoryIndicatorStore, MemoryPriceStore};

use crate::error::StoreError;
use crate::types::{IndicatorPoint, Interval, PriceBar};

/// Read-only access to the externally ingested price bars.
pub trait PriceStore: Send + Sync {
    /// Full ascending history for a key.
    fn get_ascending(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<Vec<PriceBar>, StoreError>;

    /// The newest bar for a key, if any exists.
    fn get_latest(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
    ) -> Result<Option<PriceBar>, StoreError>;

    /// The newest `n` bars for a key, ascending or descending.
    fn get_latest_n(
        &self,
        symbol: &str,
        interval: Interval,
        market_id: u32,
        n: usize,
        ascending: bool,
    ) -> Result<Vec<PriceBar>, StoreError>;
}

/// Owned storage for derived indicator points.
pub trait IndicatorStore: Send + Sync {
    /// The newest stored point for a key, if any exists.
    fn get_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<IndicatorPoint>, StoreError>;

    /// Replace-or-insert one whole point, atomically per point. Stored points
    /// are never field-patched and never pass through a delete+insert gap.
    fn upsert(&self, point: IndicatorPoint) -> Result<(), StoreError>;

    /// Remove every point for a key, returning how many were removed.
    fn delete_all(&self, symbol: &str, interval: Interval) -> Result<usize, StoreError>;
}
