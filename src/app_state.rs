// =============================================================================
// Central Application State — CoinPulse dashboard
// =============================================================================
//
// Ties the CoinGecko client, the snapshot cache and the runtime config
// together and builds the payloads served by the REST API and WebSocket feed.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the cache, config and error log. Guards are
//     never held across an `.await`.
//   - A tokio mutex serialises refreshes so two triggers never fetch twice.
//
// Indicator computation happens on the request path, on a clone of the
// cached series taken under the read lock.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use crate::analytics::{self, FearGreed, PerformanceMetrics, PriceTargets};
use crate::coingecko::{CoinGeckoClient, RateLimitSnapshot};
use crate::error::SeriesError;
use crate::indicators::rsi::calculate_rsi;
use crate::market_data::{MarketSnapshot, PriceSeries, SimplePrice};
use crate::pipeline::{self, AugmentedSeries, IndicatorKind, IndicatorRequest};
use crate::runtime_config::RuntimeConfig;
use crate::session::SnapshotCache;
use crate::trend::{self, TrendSummary};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Which subsystem reported it (e.g. `refresh`, `comparison`).
    pub source: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors retained.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    /// Monotonically increasing version; bumped on every observable change
    /// so the WebSocket feed knows when to push.
    pub state_version: AtomicU64,
    /// Total messages pushed over all WebSocket connections.
    pub ws_sequence_number: AtomicU64,

    pub runtime_config: RwLock<RuntimeConfig>,
    pub cache: RwLock<SnapshotCache>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    pub client: CoinGeckoClient,

    /// Wakes the refresh loop early (manual refresh).
    pub refresh_notify: Notify,
    refresh_lock: Mutex<()>,

    pub start_time: Instant,
}

/// Cached inputs cloned out from under the lock.
struct CachedInputs {
    snapshot: MarketSnapshot,
    history: PriceSeries,
    comparisons: BTreeMap<String, PriceSeries>,
    quotes: BTreeMap<String, SimplePrice>,
    last_update: Option<DateTime<Utc>>,
}

impl AppState {
    pub fn new(config: RuntimeConfig, client: CoinGeckoClient) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: RwLock::new(config),
            cache: RwLock::new(SnapshotCache::new()),
            recent_errors: RwLock::new(Vec::new()),
            client,
            refresh_notify: Notify::new(),
            refresh_lock: Mutex::new(()),
            start_time: Instant::now(),
        }
    }

    // ── Versioning ──────────────────────────────────────────────────────

    /// Bump the state version. Returns the previous value.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error. The ring buffer is capped at [`MAX_RECENT_ERRORS`];
    /// oldest entries are evicted first.
    pub fn push_error(&self, source: &str, msg: String) {
        let record = ErrorRecord {
            message: msg,
            source: source.to_string(),
            at: Utc::now().to_rfc3339(),
        };

        {
            let mut errors = self.recent_errors.write();
            errors.push(record);
            while errors.len() > MAX_RECENT_ERRORS {
                errors.remove(0);
            }
        }

        self.increment_version();
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Fetch snapshot, history and comparison series, then replace the cache.
    ///
    /// A failure on the tracked coin leaves the previous cache untouched.
    /// A failing comparison coin is logged and keeps its previous series.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let cfg = self.runtime_config.read().clone();
        let days = cfg.effective_history_days();

        let snapshot = self
            .client
            .get_current_price(&cfg.coin_id, &cfg.vs_currency)
            .await
            .with_context(|| format!("failed to fetch snapshot for {}", cfg.coin_id))?;

        let history = self
            .client
            .get_historical_data(&cfg.coin_id, &cfg.vs_currency, days)
            .await
            .with_context(|| format!("failed to fetch history for {}", cfg.coin_id))?;

        let mut comparisons = self.cache.read().comparisons.clone();
        comparisons.retain(|coin, _| cfg.compare_coins.contains(coin));

        for coin in cfg.compare_coins.iter().filter(|c| **c != cfg.coin_id) {
            match self.client.get_historical_data(coin, &cfg.vs_currency, days).await {
                Ok(series) => {
                    comparisons.insert(coin.clone(), series);
                }
                Err(e) => {
                    warn!(coin = %coin, error = %e, "comparison fetch failed");
                    self.push_error("comparison", format!("{coin}: {e:#}"));
                }
            }
        }

        let quotes = match self
            .client
            .get_simple_price(&cfg.compare_coins, &cfg.vs_currency)
            .await
        {
            Ok(quotes) => Some(quotes),
            Err(e) => {
                warn!(error = %e, "comparison quotes fetch failed");
                self.push_error("comparison", format!("quotes: {e:#}"));
                None
            }
        };

        let bars = history.len();
        {
            let mut cache = self.cache.write();
            cache.update(snapshot, history, Utc::now());
            cache.comparisons = comparisons;
            if let Some(quotes) = quotes {
                cache.quotes = quotes;
            }
        }
        self.increment_version();

        info!(
            coin = %cfg.coin_id,
            days,
            bars,
            "market data refreshed"
        );
        Ok(())
    }

    /// Refresh only if the cache is older than the configured threshold.
    /// Returns whether a fetch happened.
    pub async fn refresh_if_stale(&self) -> Result<bool> {
        let threshold = self.runtime_config.read().staleness_threshold();
        let stale = self.cache.read().is_stale(Utc::now(), threshold);
        if !stale {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Mark the cache stale and wake the refresh loop.
    pub fn request_refresh(&self) {
        self.cache.write().invalidate();
        self.refresh_notify.notify_one();
        self.increment_version();
    }

    // ── Indicator requests ──────────────────────────────────────────────

    /// The request for `names`, or the configured default when `names` is
    /// `None`. Window parameters always come from the config.
    pub fn indicator_request(&self, names: Option<&str>, strict: bool) -> Result<IndicatorRequest, SeriesError> {
        let cfg = self.runtime_config.read();
        let Some(names) = names else {
            return Ok(cfg.default_request());
        };

        let parts = names.split(',').filter(|s| !s.trim().is_empty());
        let request = if strict {
            IndicatorRequest::parse_strict(parts)?
        } else {
            IndicatorRequest::parse(parts)
        };
        Ok(request.with_params(cfg.indicator_params.clone()))
    }

    // ── Payload builders ────────────────────────────────────────────────

    fn cached_inputs(&self) -> Option<CachedInputs> {
        let cache = self.cache.read();
        Some(CachedInputs {
            snapshot: cache.snapshot.clone()?,
            history: cache.history.clone()?,
            comparisons: cache.comparisons.clone(),
            quotes: cache.quotes.clone(),
            last_update: cache.last_update,
        })
    }

    /// Compute the augmented series for `request` from the cached history.
    pub fn augmented_series(&self, request: &IndicatorRequest) -> Option<AugmentedSeries> {
        let history = self.cache.read().history.clone()?;
        Some(pipeline::compute(&history, request))
    }

    /// Full dashboard payload. `None` until the first successful fetch.
    pub fn build_dashboard(&self, request: &IndicatorRequest) -> Option<DashboardPayload> {
        let inputs = self.cached_inputs()?;
        let cfg = self.runtime_config.read().clone();

        let series = pipeline::compute(&inputs.history, request);
        let trend = trend::classify(&series);
        let closes = inputs.history.closes();

        let comparisons = inputs
            .comparisons
            .iter()
            .map(|(coin_id, other)| {
                let other_closes = other.closes();
                ComparisonEntry {
                    coin_id: coin_id.clone(),
                    timestamps: other.bars().iter().map(|b| b.timestamp).collect(),
                    normalized_change: analytics::normalized_change(&other_closes),
                    correlation: analytics::correlation(&closes, &other_closes),
                    quote: inputs.quotes.get(coin_id).cloned(),
                }
            })
            .collect();

        Some(DashboardPayload {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            coin_id: cfg.coin_id.clone(),
            vs_currency: cfg.vs_currency.clone(),
            last_update: inputs.last_update.map(|t| t.to_rfc3339()),
            snapshot: inputs.snapshot,
            indicators: request.kinds.iter().copied().collect(),
            summary: trend.lines(),
            trend,
            metrics: analytics::performance(&closes, cfg.volatility_window, cfg.risk_free_rate),
            series,
            comparisons,
            recent_errors: self.recent_errors.read().clone(),
            rate_limit: self
                .client
                .rate_limit()
                .snapshot(Utc::now().timestamp_millis()),
        })
    }

    /// Market analysis: trend labels, performance, sentiment and targets.
    /// Always evaluated over the full indicator vocabulary.
    pub fn build_analysis(&self) -> Option<AnalysisPayload> {
        let inputs = self.cached_inputs()?;
        let cfg = self.runtime_config.read().clone();

        let request = IndicatorRequest::new(IndicatorKind::ALL.iter().copied())
            .with_params(cfg.indicator_params.clone());
        let series = pipeline::compute(&inputs.history, &request);
        let trend = trend::classify(&series);

        let closes = inputs.history.closes();
        let metrics = analytics::performance(&closes, cfg.volatility_window, cfg.risk_free_rate);

        let snapshot = &inputs.snapshot;
        let rsi = calculate_rsi(&closes, cfg.indicator_params.rsi_window)
            .last()
            .copied()
            .flatten()
            .unwrap_or(50.0);
        let volatility_pct = metrics
            .as_ref()
            .and_then(|m| m.volatility)
            .map_or(0.0, |v| v * 100.0);
        let price_change = snapshot
            .price_change_percentage_24h
            .or(metrics.as_ref().map(|m| m.period_change_pct))
            .unwrap_or(0.0);
        // OHLC history carries no volume, so the volume component is neutral.
        let fear_greed = analytics::fear_greed_index(rsi, volatility_pct, 0.0, price_change);

        let levels: Vec<f64> = [snapshot.low_24h, snapshot.high_24h, snapshot.atl, snapshot.ath]
            .into_iter()
            .flatten()
            .collect();
        let price_targets = analytics::price_targets(snapshot.current_price, Some(levels.as_slice()));

        let ath_distance_pct = snapshot
            .ath
            .map(|ath| analytics::percentage_change(ath, snapshot.current_price));

        Some(AnalysisPayload {
            coin_id: cfg.coin_id,
            current_price: snapshot.current_price,
            summary: trend.lines(),
            trend,
            metrics,
            fear_greed,
            price_targets,
            ath_distance_pct,
            range_24h_pct: snapshot.range_24h_pct(),
        })
    }

    /// Rows for the metrics CSV export.
    pub fn metric_rows(&self) -> Option<Vec<(&'static str, Option<f64>)>> {
        let snapshot = self.cache.read().snapshot.clone()?;
        Some(vec![
            ("Current Price", Some(snapshot.current_price)),
            ("Market Cap", snapshot.market_cap),
            ("24h Volume", snapshot.total_volume),
            ("24h Change %", snapshot.price_change_percentage_24h),
            ("7d Change %", snapshot.price_change_percentage_7d),
            ("30d Change %", snapshot.price_change_percentage_30d),
            ("Market Cap Rank", snapshot.market_cap_rank.map(f64::from)),
            ("All-Time High", snapshot.ath),
            ("All-Time Low", snapshot.atl),
        ])
    }

    pub fn health(&self) -> HealthReport {
        let cache = self.cache.read();
        let now = Utc::now();
        HealthReport {
            status: if cache.is_populated() { "ok" } else { "warming_up" },
            state_version: self.current_state_version(),
            server_time: now.timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            cache_age_secs: cache.age_secs(now),
            ws_messages_sent: self.ws_sequence_number.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Payload types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardPayload {
    pub state_version: u64,
    pub server_time: i64,
    pub coin_id: String,
    pub vs_currency: String,
    pub last_update: Option<String>,
    pub snapshot: MarketSnapshot,
    pub indicators: Vec<IndicatorKind>,
    pub series: AugmentedSeries,
    pub trend: TrendSummary,
    pub summary: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,

    pub comparisons: Vec<ComparisonEntry>,
    pub recent_errors: Vec<ErrorRecord>,
    pub rate_limit: RateLimitSnapshot,
}

/// One comparison coin, normalised for the overlay chart.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonEntry {
    pub coin_id: String,
    pub timestamps: Vec<i64>,
    pub normalized_change: Vec<f64>,
    /// Correlation with the tracked coin; only when both series have the
    /// same length.
    pub correlation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<SimplePrice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPayload {
    pub coin_id: String,
    pub current_price: f64,
    pub trend: TrendSummary,
    pub summary: Vec<String>,
    pub metrics: Option<PerformanceMetrics>,
    pub fear_greed: FearGreed,
    pub price_targets: PriceTargets,
    pub ath_distance_pct: Option<f64>,
    pub range_24h_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub cache_age_secs: Option<i64>,
    pub ws_messages_sent: u64,
}
