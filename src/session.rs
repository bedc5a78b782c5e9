// =============================================================================
// Snapshot Cache — the last fetched market data and when it arrived
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::market_data::{MarketSnapshot, PriceSeries, SimplePrice};

/// Cached market data for the tracked coin plus comparison coins.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    pub snapshot: Option<MarketSnapshot>,
    pub history: Option<PriceSeries>,
    pub comparisons: BTreeMap<String, PriceSeries>,
    /// Latest quote per comparison coin from `/simple/price`.
    pub quotes: BTreeMap<String, SimplePrice>,
    pub last_update: Option<DateTime<Utc>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stale when nothing was ever fetched or the last fetch is older than
    /// `threshold` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_update {
            None => true,
            Some(at) => now - at > threshold,
        }
    }

    /// `true` once both the snapshot and the history are present.
    pub fn is_populated(&self) -> bool {
        self.snapshot.is_some() && self.history.is_some()
    }

    /// Replace the primary data and stamp `now`.
    pub fn update(&mut self, snapshot: MarketSnapshot, history: PriceSeries, now: DateTime<Utc>) {
        self.snapshot = Some(snapshot);
        self.history = Some(history);
        self.last_update = Some(now);
    }

    pub fn set_comparison(&mut self, coin_id: impl Into<String>, series: PriceSeries) {
        self.comparisons.insert(coin_id.into(), series);
    }

    /// Force the next staleness check to refetch. Cached data stays
    /// readable until it is replaced.
    pub fn invalidate(&mut self) {
        self.last_update = None;
    }

    /// Seconds since the last update, if any.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_update.map(|at| (now - at).num_seconds())
    }
}
