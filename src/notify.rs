// =============================================================================
// Downstream notifications — latest-point snapshots after successful updates
// =============================================================================
//
// After an update writes fresh points, the dispatcher publishes a key-value
// snapshot of the newest stored point to a per-series topic
// (`BTC/USD_I1h`). Absent fields serialize as empty strings so subscribers
// can tell "unknown" from a real zero.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::types::{IndicatorPoint, SeriesKey};

/// Topic name for a series, `<symbol>_I<interval>`.
pub fn topic_for(key: &SeriesKey) -> String {
    format!("{}_I{}", key.symbol, key.interval)
}

fn format_float_or_empty(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}

/// Flatten a point into the published key-value form.
pub fn snapshot_payload(point: &IndicatorPoint) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("timestamp".into(), point.unix.to_string());
    payload.insert("volume".into(), format_float_or_empty(point.volume));
    payload.insert("ma_short".into(), format_float_or_empty(point.ma_short));
    payload.insert("ma_long".into(), format_float_or_empty(point.ma_long));
    payload.insert("macd".into(), format_float_or_empty(point.macd));
    payload.insert("signal".into(), format_float_or_empty(point.signal));
    payload.insert("histogram".into(), format_float_or_empty(point.histogram));
    payload.insert("rsi".into(), format_float_or_empty(point.rsi));
    payload.insert("stoch_k".into(), format_float_or_empty(point.stoch_k));
    payload.insert("stoch_d".into(), format_float_or_empty(point.stoch_d));
    payload.insert("ema_close".into(), format_float_or_empty(point.ema_close));
    payload.insert("ema_high".into(), format_float_or_empty(point.ema_high));
    payload.insert("ema_low".into(), format_float_or_empty(point.ema_low));
    payload.insert("kdj_k".into(), format_float_or_empty(point.kdj_k));
    payload.insert("kdj_d".into(), format_float_or_empty(point.kdj_d));
    payload.insert("kdj_j".into(), format_float_or_empty(point.kdj_j));
    payload
}

/// One published notification.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub topic: String,
    pub payload: BTreeMap<String, String>,
}

/// Sink for post-update notifications. The transport that carries them to
/// subscribers is external; failures are reported to the caller and logged,
/// never fatal.
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: &str, payload: &BTreeMap<String, String>) -> Result<()>;
}

// =============================================================================
// BroadcastNotifier
// =============================================================================

/// Fans notifications out to in-process subscribers over a tokio broadcast
/// channel. Lagging or absent subscribers never block the dispatcher.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, topic: &str, payload: &BTreeMap<String, String>) -> Result<()> {
        let notification = Notification {
            topic: topic.to_string(),
            payload: payload.clone(),
        };

        // A send error only means nobody is subscribed right now.
        match self.tx.send(notification) {
            Ok(receivers) => {
                debug!(topic, receivers, "notification published");
            }
            Err(_) => {
                debug!(topic, "notification dropped; no subscribers");
            }
        }
        info!(topic, "indicator snapshot published");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;
    use chrono::{TimeZone, Utc};

    fn sample_point() -> IndicatorPoint {
        IndicatorPoint {
            unix: 1_700_000_000,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            symbol: "BTC/USD".into(),
            interval: Interval::OneHour,
            volume: Some(12.5),
            ma_short: Some(101.25),
            ma_long: None,
            macd: Some(0.5),
            signal: Some(0.25),
            histogram: Some(0.25),
            rsi: None,
            stoch_k: Some(80.0),
            stoch_d: Some(75.0),
            ema_close: Some(100.0),
            ema_high: Some(101.0),
            ema_low: Some(99.0),
            kdj_k: None,
            kdj_d: None,
            kdj_j: None,
        }
    }

    #[test]
    fn topic_format() {
        let key = SeriesKey::new("BTC/USD", Interval::OneHour);
        assert_eq!(topic_for(&key), "BTC/USD_I1h");
    }

    #[test]
    fn payload_preserves_unknown_as_empty() {
        let payload = snapshot_payload(&sample_point());
        assert_eq!(payload["ma_short"], "101.25");
        assert_eq!(payload["ma_long"], "");
        assert_eq!(payload["rsi"], "");
        assert_eq!(payload["timestamp"], "1700000000");
    }

    #[test]
    fn broadcast_delivers_to_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        let payload = snapshot_payload(&sample_point());
        notifier.publish("BTC/USD_I1h", &payload).unwrap();

        let received = rx.try_recv().unwrap();
        assert_eq!(received.topic, "BTC/USD_I1h");
        assert_eq!(received.payload["macd"], "0.5");
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new(8);
        let payload = snapshot_payload(&sample_point());
        assert!(notifier.publish("BTC/USD_I1h", &payload).is_ok());
    }
}
