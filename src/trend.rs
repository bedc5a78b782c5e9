// =============================================================================
// Trend Classifier — qualitative labels from the latest indicator row
// =============================================================================
//
// Rules (each evaluated independently; a rule whose inputs are missing or
// undefined in the latest row is omitted):
//
//   MA trend     SMA_20 >  SMA_50        => Bullish, otherwise Bearish
//   RSI status   RSI    >  70            => Overbought
//                RSI    <  30            => Oversold, otherwise Neutral
//   MACD status  MACD   >  MACD_Signal   => Bullish, otherwise Bearish
//   Price vs MA  close  >  SMA_xx        => Above, otherwise Below
//
// Comparisons are strict: equality falls on the Bearish / Neutral / Below
// side.
// =============================================================================

use serde::Serialize;

use crate::pipeline::{columns, AugmentedSeries};
use crate::types::{PricePosition, RsiStatus, Trend};

/// RSI above this is overbought.
pub const RSI_OVERBOUGHT: f64 = 70.0;
/// RSI below this is oversold.
pub const RSI_OVERSOLD: f64 = 30.0;

/// Labels derived from the most recent row of an [`AugmentedSeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma_trend: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_status: Option<RsiStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_status: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_vs_sma_20: Option<PricePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_vs_sma_50: Option<PricePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
}

impl TrendSummary {
    /// `true` when no signal could be derived.
    pub fn is_empty(&self) -> bool {
        self.ma_trend.is_none()
            && self.rsi_status.is_none()
            && self.macd_status.is_none()
            && self.price_vs_sma_20.is_none()
            && self.price_vs_sma_50.is_none()
    }

    /// Human-readable bullet lines for the dashboard's technical summary.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(pos) = self.price_vs_sma_20 {
            out.push(format!("Price is {pos} 20-day SMA"));
        }
        if let Some(pos) = self.price_vs_sma_50 {
            out.push(format!("Price is {pos} 50-day SMA"));
        }
        if let (Some(rsi), Some(status)) = (self.rsi, self.rsi_status) {
            out.push(format!("RSI: {rsi:.1} ({status})"));
        }
        if let Some(trend) = self.ma_trend {
            out.push(format!("Moving averages: {trend}"));
        }
        if let Some(trend) = self.macd_status {
            out.push(format!("MACD: {trend}"));
        }
        out
    }
}

/// Classify the latest row of `series`. Zero rows yield an empty summary.
pub fn classify(series: &AugmentedSeries) -> TrendSummary {
    let Some(last_bar) = series.bars.last() else {
        return TrendSummary::default();
    };

    let sma_20 = series.latest(columns::SMA_20);
    let sma_50 = series.latest(columns::SMA_50);
    let rsi = series.latest(columns::RSI);
    let macd = series.latest(columns::MACD);
    let macd_signal = series.latest(columns::MACD_SIGNAL);

    TrendSummary {
        ma_trend: crossover(sma_20, sma_50),
        rsi_status: rsi.map(rsi_status),
        macd_status: crossover(macd, macd_signal),
        price_vs_sma_20: sma_20.map(|sma| price_position(last_bar.close, sma)),
        price_vs_sma_50: sma_50.map(|sma| price_position(last_bar.close, sma)),
        rsi,
    }
}

/// Classify an RSI reading.
pub fn rsi_status(rsi: f64) -> RsiStatus {
    if rsi > RSI_OVERBOUGHT {
        RsiStatus::Overbought
    } else if rsi < RSI_OVERSOLD {
        RsiStatus::Oversold
    } else {
        RsiStatus::Neutral
    }
}

fn crossover(fast: Option<f64>, slow: Option<f64>) -> Option<Trend> {
    let (fast, slow) = (fast?, slow?);
    Some(if fast > slow {
        Trend::Bullish
    } else {
        Trend::Bearish
    })
}

fn price_position(close: f64, average: f64) -> PricePosition {
    if close > average {
        PricePosition::Above
    } else {
        PricePosition::Below
    }
}
