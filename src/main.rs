// =============================================================================
// CoinPulse — Main Entry Point
// =============================================================================
//
// Loads the dashboard config, starts the refresh loop against CoinGecko and
// serves the REST + WebSocket API until Ctrl+C. The config file is only read;
// nothing is persisted.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analytics;
mod api;
mod app_state;
mod coingecko;
mod error;
mod indicators;
mod market_data;
mod pipeline;
mod runtime_config;
mod session;
mod trend;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::coingecko::CoinGeckoClient;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "dashboard_config.json";

/// How often the refresh loop checks the cache for staleness.
const REFRESH_CHECK_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("CoinPulse starting up");

    let config_path =
        std::env::var("COINPULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    info!(
        coin = %config.coin_id,
        vs_currency = %config.vs_currency,
        history_days = config.effective_history_days(),
        compare = ?config.compare_coins,
        indicators = ?config.default_indicators,
        "dashboard configured"
    );

    // ── 2. Shared state ──────────────────────────────────────────────────
    let base_url = std::env::var("COINGECKO_BASE_URL")
        .unwrap_or_else(|_| coingecko::DEFAULT_BASE_URL.to_string());
    let client = CoinGeckoClient::new(base_url)?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, client));

    // ── 3. Refresh loop ──────────────────────────────────────────────────
    // Refetches when the cache is stale, or immediately after a manual
    // refresh request. With auto_refresh off, only the first load and manual
    // requests fetch.
    let refresh_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(REFRESH_CHECK_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let auto = refresh_state.runtime_config.read().auto_refresh;
                    let loaded = refresh_state.cache.read().is_populated();
                    if !auto && loaded {
                        continue;
                    }
                }
                _ = refresh_state.refresh_notify.notified() => {
                    info!("manual refresh triggered");
                }
            }

            if let Err(e) = refresh_state.refresh_if_stale().await {
                let msg = format!("{e:#}");
                error!(error = %msg, "refresh failed, keeping previous data");
                refresh_state.push_error("refresh", msg);
            }
        }
    });

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping");
    server.abort();

    info!("CoinPulse shut down complete.");
    Ok(())
}
