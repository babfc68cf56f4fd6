// =============================================================================
// Warm-up / Window Policy
// =============================================================================
//
// Decides how many trailing bars an incremental recompute must reload so that
// every indicator in the freshly computed tail is numerically converged. The
// dominant constraint is the MACD's period-26 EMA, which needs on the order
// of 200+ bars to converge; the buffer defaults to 260 bars.
//
// The persisted tail starts `trim_fraction` of the way into the buffer, which
// discards the still-warming prefix of the recomputed window.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Interval;

fn default_convergence_buffer() -> usize {
    260
}

fn default_trim_fraction() -> f64 {
    0.9
}

/// Sizing rules for incremental recomputes.
///
/// `trim_fraction` is a tunable heuristic, not a proven convergence bound;
/// the convergence tests pin its behaviour at the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// Trailing bars required for EMA-family convergence.
    #[serde(default = "default_convergence_buffer")]
    pub convergence_buffer: usize,

    /// Fraction of the buffer to skip before persisting recomputed points.
    #[serde(default = "default_trim_fraction")]
    pub trim_fraction: f64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            convergence_buffer: default_convergence_buffer(),
            trim_fraction: default_trim_fraction(),
        }
    }
}

impl WindowPolicy {
    /// Number of whole bars between the newest price bar and the latest
    /// stored indicator point.
    ///
    /// A negative timestamp delta (clock skew, out-of-order ingestion) is an
    /// inconsistency: it is logged and clamped to zero rather than failing
    /// the recompute.
    pub fn gap_bars(
        &self,
        latest_bar_unix: i64,
        latest_point_unix: i64,
        interval: Interval,
    ) -> usize {
        let delta = latest_bar_unix - latest_point_unix;
        if delta < 0 {
            warn!(
                latest_bar_unix,
                latest_point_unix,
                interval = %interval,
                "latest indicator point is ahead of the latest price bar; clamping gap to 0"
            );
            return 0;
        }
        (delta / interval.secs()) as usize
    }

    /// Trailing bars to fetch for a correct incremental recompute.
    pub fn required_bars(&self, gap: usize) -> usize {
        gap + self.convergence_buffer
    }

    /// Index into the recomputed window from which points are persisted.
    pub fn trim_start(&self) -> usize {
        (self.trim_fraction * self.convergence_buffer as f64) as usize
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = WindowPolicy::default();
        assert_eq!(policy.convergence_buffer, 260);
        assert!((policy.trim_fraction - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_gap_requires_buffer_alone() {
        let policy = WindowPolicy::default();
        assert_eq!(policy.required_bars(0), 260);
    }

    #[test]
    fn gap_500_requires_760() {
        let policy = WindowPolicy::default();
        assert_eq!(policy.required_bars(500), 760);
    }

    #[test]
    fn gap_counts_whole_bars() {
        let policy = WindowPolicy::default();
        let gap = policy.gap_bars(1_700_036_000, 1_700_000_000, Interval::OneHour);
        assert_eq!(gap, 10);
    }

    #[test]
    fn negative_gap_clamps_to_buffer_alone() {
        let policy = WindowPolicy::default();
        let gap = policy.gap_bars(1_700_000_000, 1_700_003_600, Interval::OneHour);
        assert_eq!(gap, 0);
        assert_eq!(policy.required_bars(gap), 260);
    }

    #[test]
    fn trim_start_is_90_percent_of_buffer() {
        let policy = WindowPolicy::default();
        assert_eq!(policy.trim_start(), 234);
    }

    #[test]
    fn trim_start_tracks_tuned_fraction() {
        let policy = WindowPolicy {
            convergence_buffer: 100,
            trim_fraction: 0.5,
        };
        assert_eq!(policy.trim_start(), 50);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let policy: WindowPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.convergence_buffer, 260);
        assert_eq!(policy.trim_start(), 234);
    }
}
