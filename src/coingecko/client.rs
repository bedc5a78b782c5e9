// =============================================================================
// CoinGecko REST Client — snapshot, OHLC history and simple prices
// =============================================================================
//
// Public endpoints only, no API key. Every request goes through `get_json`,
// which consults the rate-limit tracker first and feeds every response back
// into it. Response parsing lives in free functions so it can be tested
// without the network.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimitTracker;
use crate::market_data::{MarketSnapshot, PriceBar, PriceSeries, SimplePrice};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Timeout for the light endpoints (`/coins/{id}`, `/simple/price`).
const SHORT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the OHLC history endpoint.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl CoinGeckoClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static("CoinPulse/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(HISTORY_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "CoinGeckoClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn get_json(&self, path: &str, query: &[(&str, String)], timeout: Duration) -> Result<Value> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        if !self.rate_limit.can_send_request(now_ms) {
            bail!("CoinGecko GET {path} skipped: rate-limit cooldown active");
        }

        let url = format!("{}{}", self.base_url, path);
        self.rate_limit.record_request();

        let resp = self
            .client
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = resp.status();
        self.rate_limit
            .update_from_response(status, resp.headers(), chrono::Utc::now().timestamp_millis());

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("CoinGecko GET {path} returned {status}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse GET {path} response"))
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET /coins/{id}: current market snapshot.
    #[instrument(skip(self), name = "coingecko::get_current_price")]
    pub async fn get_current_price(&self, coin_id: &str, vs_currency: &str) -> Result<MarketSnapshot> {
        let query = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
            ("sparkline", "false".to_string()),
        ];
        let body = self
            .get_json(&format!("/coins/{coin_id}"), &query, SHORT_TIMEOUT)
            .await?;

        let snapshot = parse_market_snapshot(&body, coin_id, vs_currency)?;
        debug!(coin = %coin_id, price = snapshot.current_price, "snapshot fetched");
        Ok(snapshot)
    }

    /// GET /coins/{id}/ohlc: cleaned OHLC history over `days`.
    #[instrument(skip(self), name = "coingecko::get_historical_data")]
    pub async fn get_historical_data(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<PriceSeries> {
        let query = [
            ("vs_currency", vs_currency.to_string()),
            ("days", days.to_string()),
        ];
        let body = self
            .get_json(&format!("/coins/{coin_id}/ohlc"), &query, HISTORY_TIMEOUT)
            .await?;

        let bars = parse_ohlc_rows(&body)?;
        let series = PriceSeries::clean(bars)
            .with_context(|| format!("history for {coin_id} is unusable"))?;

        debug!(coin = %coin_id, bars = series.len(), "history fetched");
        Ok(series)
    }

    /// GET /simple/price: prices for several coins in one call.
    #[instrument(skip(self), name = "coingecko::get_simple_price")]
    pub async fn get_simple_price(
        &self,
        coin_ids: &[String],
        vs_currency: &str,
    ) -> Result<BTreeMap<String, SimplePrice>> {
        if coin_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let query = [
            ("ids", coin_ids.join(",")),
            ("vs_currencies", vs_currency.to_string()),
            ("include_24hr_change", "true".to_string()),
            ("include_24hr_vol", "true".to_string()),
            ("include_market_cap", "true".to_string()),
        ];
        let body = self.get_json("/simple/price", &query, SHORT_TIMEOUT).await?;
        parse_simple_price(&body, vs_currency)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

/// Parse the `/coins/{id}` response into a [`MarketSnapshot`].
pub fn parse_market_snapshot(body: &Value, coin_id: &str, vs_currency: &str) -> Result<MarketSnapshot> {
    let md = body
        .get("market_data")
        .filter(|v| v.is_object())
        .context("coin response missing 'market_data'")?;

    let quoted = |field: &str| md.get(field).and_then(|v| v.get(vs_currency)).and_then(Value::as_f64);
    let quoted_str = |field: &str| {
        md.get(field)
            .and_then(|v| v.get(vs_currency))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let plain = |field: &str| md.get(field).and_then(Value::as_f64);

    let current_price = quoted("current_price")
        .with_context(|| format!("coin response missing current_price.{vs_currency}"))?;

    Ok(MarketSnapshot {
        coin_id: coin_id.to_string(),
        vs_currency: vs_currency.to_string(),
        current_price,
        market_cap: quoted("market_cap"),
        market_cap_rank: body
            .get("market_cap_rank")
            .and_then(Value::as_u64)
            .and_then(|r| u32::try_from(r).ok()),
        total_volume: quoted("total_volume"),
        high_24h: quoted("high_24h"),
        low_24h: quoted("low_24h"),
        price_change_24h: plain("price_change_24h"),
        price_change_percentage_24h: plain("price_change_percentage_24h"),
        price_change_percentage_7d: plain("price_change_percentage_7d"),
        price_change_percentage_30d: plain("price_change_percentage_30d"),
        market_cap_change_24h: plain("market_cap_change_24h"),
        market_cap_change_percentage_24h: plain("market_cap_change_percentage_24h"),
        circulating_supply: plain("circulating_supply"),
        total_supply: plain("total_supply"),
        max_supply: plain("max_supply"),
        ath: quoted("ath"),
        ath_change_percentage: quoted("ath_change_percentage"),
        ath_date: quoted_str("ath_date"),
        atl: quoted("atl"),
        atl_change_percentage: quoted("atl_change_percentage"),
        atl_date: quoted_str("atl_date"),
        last_updated: body
            .get("last_updated")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Parse `/coins/{id}/ohlc` rows `[ts_ms, open, high, low, close]`.
///
/// Non-numeric cells become NaN so that [`PriceSeries::clean`] can
/// forward-fill them. Rows that are too short or lack a timestamp are skipped.
pub fn parse_ohlc_rows(body: &Value) -> Result<Vec<PriceBar>> {
    let rows = body.as_array().context("OHLC response is not an array")?;
    if rows.is_empty() {
        bail!("no historical data returned from API");
    }

    let mut bars = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let Some(row) = row.as_array().filter(|r| r.len() >= 5) else {
            skipped += 1;
            continue;
        };
        let Some(ts) = row[0].as_i64().or_else(|| row[0].as_f64().map(|t| t as i64)) else {
            skipped += 1;
            continue;
        };
        bars.push(PriceBar::new(
            ts,
            cell(row, 1),
            cell(row, 2),
            cell(row, 3),
            cell(row, 4),
        ));
    }

    if skipped > 0 {
        warn!(skipped, "malformed OHLC rows skipped");
    }
    Ok(bars)
}

fn cell(row: &[Value], i: usize) -> f64 {
    row[i].as_f64().unwrap_or(f64::NAN)
}

/// Parse `/simple/price` into a map keyed by coin id. Coins without a price
/// in `vs_currency` are left out.
pub fn parse_simple_price(body: &Value, vs_currency: &str) -> Result<BTreeMap<String, SimplePrice>> {
    let obj = body.as_object().context("simple price response is not an object")?;

    let out = obj
        .iter()
        .filter_map(|(id, entry)| {
            let price = entry.get(vs_currency)?.as_f64()?;
            let field = |suffix: &str| {
                entry
                    .get(format!("{vs_currency}_{suffix}"))
                    .and_then(Value::as_f64)
            };
            Some((
                id.clone(),
                SimplePrice {
                    price,
                    market_cap: field("market_cap"),
                    volume_24h: field("24h_vol"),
                    change_24h_pct: field("24h_change"),
                },
            ))
        })
        .collect();

    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_trims_trailing_slash() {
        let c = CoinGeckoClient::new("http://localhost:9/api/v3/").unwrap();
        assert_eq!(c.base_url, "http://localhost:9/api/v3");
    }

    #[test]
    fn snapshot_parses_quoted_and_plain_fields() {
        let body = json!({
            "market_cap_rank": 1,
            "last_updated": "2024-05-01T00:00:00.000Z",
            "market_data": {
                "current_price": { "usd": 60000.0, "eur": 56000.0 },
                "market_cap": { "usd": 1.2e12 },
                "high_24h": { "usd": 61000.0 },
                "low_24h": { "usd": 59000.0 },
                "price_change_percentage_24h": -1.5,
                "max_supply": null,
                "ath": { "usd": 73000.0 },
                "ath_date": { "usd": "2024-03-14T07:10:36.635Z" }
            }
        });

        let snap = parse_market_snapshot(&body, "bitcoin", "usd").unwrap();
        assert_eq!(snap.current_price, 60000.0);
        assert_eq!(snap.market_cap_rank, Some(1));
        assert_eq!(snap.high_24h, Some(61000.0));
        assert_eq!(snap.price_change_percentage_24h, Some(-1.5));
        assert_eq!(snap.price_change_percentage_7d, None);
        assert_eq!(snap.max_supply, None);
        assert_eq!(snap.ath_date.as_deref(), Some("2024-03-14T07:10:36.635Z"));

        let eur = parse_market_snapshot(&body, "bitcoin", "eur").unwrap();
        assert_eq!(eur.current_price, 56000.0);
        assert_eq!(eur.high_24h, None);
    }

    #[test]
    fn snapshot_without_price_is_an_error() {
        let body = json!({ "market_data": { "current_price": {} } });
        assert!(parse_market_snapshot(&body, "bitcoin", "usd").is_err());
        assert!(parse_market_snapshot(&json!({}), "bitcoin", "usd").is_err());
    }

    #[test]
    fn ohlc_rows_parse_and_skip_malformed() {
        let body = json!([
            [1_700_000_000_000_i64, 100.0, 110.0, 95.0, 105.0],
            [1_700_000_001_000_i64, 105.0, null, 100.0, 108.0],
            [1_700_000_002_000_i64, 108.0],
            "garbage"
        ]);
        let bars = parse_ohlc_rows(&body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].price, 105.0);
        assert!(bars[1].high.is_nan());

        let series = PriceSeries::clean(bars).unwrap();
        assert_eq!(series.bars()[1].high, 110.0);
    }

    #[test]
    fn empty_ohlc_is_an_error() {
        assert!(parse_ohlc_rows(&json!([])).is_err());
        assert!(parse_ohlc_rows(&json!({ "error": "coin not found" })).is_err());
    }

    #[test]
    fn simple_price_reads_suffixed_fields() {
        let body = json!({
            "bitcoin": {
                "usd": 60000.0,
                "usd_market_cap": 1.2e12,
                "usd_24h_vol": 3.0e10,
                "usd_24h_change": 2.5
            },
            "ethereum": { "eur": 3000.0 }
        });
        let prices = parse_simple_price(&body, "usd").unwrap();
        assert_eq!(prices.len(), 1);
        let btc = &prices["bitcoin"];
        assert_eq!(btc.price, 60000.0);
        assert_eq!(btc.volume_24h, Some(3.0e10));
        assert_eq!(btc.change_24h_pct, Some(2.5));
    }
}
