// =============================================================================
// Market Snapshot — current market state of one coin
// =============================================================================

use serde::{Deserialize, Serialize};

/// Current price and market statistics for a coin, quoted in one currency.
///
/// Only `current_price` is guaranteed; CoinGecko omits or nulls the rest for
/// young or illiquid assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub coin_id: String,
    pub vs_currency: String,
    pub current_price: f64,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
    pub market_cap_change_24h: Option<f64>,
    pub market_cap_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub ath_date: Option<String>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub atl_date: Option<String>,
    pub last_updated: Option<String>,
}

impl MarketSnapshot {
    /// Width of the 24h range as a percentage of the low.
    pub fn range_24h_pct(&self) -> Option<f64> {
        let (high, low) = (self.high_24h?, self.low_24h?);
        if low <= 0.0 {
            return None;
        }
        Some((high - low) / low * 100.0)
    }
}

/// One entry of the `/simple/price` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplePrice {
    pub price: f64,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub change_24h_pct: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_needs_both_ends() {
        let mut s = MarketSnapshot {
            high_24h: Some(110.0),
            low_24h: Some(100.0),
            ..MarketSnapshot::default()
        };
        assert!((s.range_24h_pct().unwrap() - 10.0).abs() < 1e-12);
        s.low_24h = None;
        assert_eq!(s.range_24h_pct(), None);
        s.low_24h = Some(0.0);
        assert_eq!(s.range_24h_pct(), None);
    }
}
