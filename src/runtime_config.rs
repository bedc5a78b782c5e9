// =============================================================================
// Runtime Configuration — dashboard settings loaded at startup
// =============================================================================
//
// Every tunable of the dashboard lives here: which coin to track, how much
// history to pull, how often to refresh, which indicators are selected by
// default and with which windows.
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::{IndicatorKind, IndicatorParams, IndicatorRequest};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_coin_id() -> String {
    "bitcoin".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_history_days() -> u32 {
    30
}

fn default_compare_coins() -> Vec<String> {
    vec!["ethereum".to_string()]
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_indicators() -> Vec<IndicatorKind> {
    vec![IndicatorKind::Sma20, IndicatorKind::Sma50, IndicatorKind::Rsi]
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_volatility_window() -> usize {
    30
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

/// History windows offered by the CoinGecko OHLC endpoint.
pub const SUPPORTED_HISTORY_DAYS: &[u32] = &[1, 7, 14, 30, 90, 180, 365];

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the dashboard.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Market data --------------------------------------------------------

    /// CoinGecko coin id of the tracked asset.
    #[serde(default = "default_coin_id")]
    pub coin_id: String,

    /// Quote currency for prices.
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// Days of OHLC history to fetch.
    #[serde(default = "default_history_days")]
    pub history_days: u32,

    /// Additional coins fetched for the comparison chart.
    #[serde(default = "default_compare_coins")]
    pub compare_coins: Vec<String>,

    // --- Refresh ------------------------------------------------------------

    /// Staleness threshold: cached data older than this is refetched.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Whether the background loop refreshes automatically.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,

    // --- Indicators ---------------------------------------------------------

    /// Indicators used when a request does not name any.
    #[serde(default = "default_indicators")]
    pub default_indicators: Vec<IndicatorKind>,

    /// Window lengths and smoothing spans.
    #[serde(default)]
    pub indicator_params: IndicatorParams,

    // --- Analytics ----------------------------------------------------------

    /// Annual risk-free rate for the Sharpe ratio (0.02 = 2 %).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Window for the rolling volatility statistic.
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,

    // --- Server -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            coin_id: default_coin_id(),
            vs_currency: default_vs_currency(),
            history_days: default_history_days(),
            compare_coins: default_compare_coins(),
            refresh_interval_secs: default_refresh_interval_secs(),
            auto_refresh: true,
            default_indicators: default_indicators(),
            indicator_params: IndicatorParams::default(),
            risk_free_rate: default_risk_free_rate(),
            volatility_window: default_volatility_window(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            coin = %config.coin_id,
            history_days = config.history_days,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `COINPULSE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(coin) = std::env::var("COINPULSE_COIN") {
            let coin = coin.trim().to_lowercase();
            if !coin.is_empty() {
                self.coin_id = coin;
            }
        }
        if let Ok(addr) = std::env::var("COINPULSE_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }

    /// Staleness threshold as a `chrono::Duration`.
    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.refresh_interval_secs).unwrap_or(i64::MAX / 1000))
    }

    /// The indicator request used when a caller does not pick its own set.
    pub fn default_request(&self) -> IndicatorRequest {
        IndicatorRequest::new(self.default_indicators.iter().copied())
            .with_params(self.indicator_params.clone())
    }

    /// `history_days` if CoinGecko supports it, otherwise the closest
    /// supported value at or above it (capped at 365).
    pub fn effective_history_days(&self) -> u32 {
        SUPPORTED_HISTORY_DAYS
            .iter()
            .copied()
            .find(|&d| d >= self.history_days)
            .unwrap_or(365)
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
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.coin_id, "bitcoin");
        assert_eq!(cfg.vs_currency, "usd");
        assert_eq!(cfg.history_days, 30);
        assert_eq!(cfg.refresh_interval_secs, 300);
        assert!(cfg.auto_refresh);
        assert_eq!(
            cfg.default_indicators,
            vec![IndicatorKind::Sma20, IndicatorKind::Sma50, IndicatorKind::Rsi]
        );
        assert!((cfg.risk_free_rate - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.coin_id, "bitcoin");
        assert_eq!(cfg.compare_coins, vec!["ethereum"]);
        assert_eq!(cfg.indicator_params.rsi_window, 14);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "coin_id": "solana",
            "default_indicators": ["MACD", "Bollinger_Bands"],
            "indicator_params": { "bb_window": 10 }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.coin_id, "solana");
        assert_eq!(
            cfg.default_indicators,
            vec![IndicatorKind::Macd, IndicatorKind::BollingerBands]
        );
        assert_eq!(cfg.indicator_params.bb_window, 10);
        assert_eq!(cfg.indicator_params.sma_long, 50);
        assert_eq!(cfg.refresh_interval_secs, 300);
    }

    #[test]
    fn load_reads_written_file() {
        let dir = std::env::temp_dir().join(format!("coinpulse-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.coin_id = "cardano".into();
        std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.coin_id, "cardano");
        assert_eq!(loaded.default_indicators, cfg.default_indicators);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/coinpulse.json").is_err());
    }

    #[test]
    fn default_request_carries_params() {
        let mut cfg = RuntimeConfig::default();
        cfg.indicator_params.rsi_window = 9;
        let req = cfg.default_request();
        assert!(req.contains(IndicatorKind::Rsi));
        assert_eq!(req.kinds.len(), 3);
        assert_eq!(req.params.rsi_window, 9);
    }

    #[test]
    fn history_days_snap_to_supported() {
        let mut cfg = RuntimeConfig::default();
        cfg.history_days = 30;
        assert_eq!(cfg.effective_history_days(), 30);
        cfg.history_days = 45;
        assert_eq!(cfg.effective_history_days(), 90);
        cfg.history_days = 1000;
        assert_eq!(cfg.effective_history_days(), 365);
    }

    #[test]
    fn staleness_threshold_matches_interval() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.staleness_threshold(), chrono::Duration::seconds(300));
    }
}
