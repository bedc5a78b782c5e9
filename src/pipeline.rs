// =============================================================================
// Indicator Pipeline — request -> augmented series
// =============================================================================
//
// Maps the closed indicator vocabulary onto the indicator library and
// assembles an `AugmentedSeries`: the input bars plus one or more named,
// index-aligned columns per selected indicator.
//
// The input series is never mutated. Indicators are independent of each
// other, so the request is held as an ordered set and the output column order
// is canonical regardless of selection order.
// =============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SeriesError;
use crate::indicators::{self, Column};
use crate::market_data::{PriceBar, PriceSeries, RawBar};

// =============================================================================
// Vocabulary
// =============================================================================

/// Selectable indicators. The string names are a stable contract with the
/// dashboard's selection control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    #[serde(rename = "SMA_20")]
    Sma20,
    #[serde(rename = "SMA_50")]
    Sma50,
    #[serde(rename = "EMA_12")]
    Ema12,
    #[serde(rename = "EMA_26")]
    Ema26,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "Bollinger_Bands")]
    BollingerBands,
    #[serde(rename = "Stochastic")]
    Stochastic,
    #[serde(rename = "Williams_R")]
    WilliamsR,
    #[serde(rename = "ATR")]
    Atr,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 10] = [
        Self::Sma20,
        Self::Sma50,
        Self::Ema12,
        Self::Ema26,
        Self::Rsi,
        Self::Macd,
        Self::BollingerBands,
        Self::Stochastic,
        Self::WilliamsR,
        Self::Atr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sma20 => "SMA_20",
            Self::Sma50 => "SMA_50",
            Self::Ema12 => "EMA_12",
            Self::Ema26 => "EMA_26",
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::BollingerBands => "Bollinger_Bands",
            Self::Stochastic => "Stochastic",
            Self::WilliamsR => "Williams_R",
            Self::Atr => "ATR",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorKind {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| SeriesError::UnknownIndicator {
                name: name.to_string(),
            })
    }
}

/// Output column names.
pub mod columns {
    pub const SMA_20: &str = "SMA_20";
    pub const SMA_50: &str = "SMA_50";
    pub const EMA_12: &str = "EMA_12";
    pub const EMA_26: &str = "EMA_26";
    pub const RSI: &str = "RSI";
    pub const MACD: &str = "MACD";
    pub const MACD_SIGNAL: &str = "MACD_Signal";
    pub const MACD_HISTOGRAM: &str = "MACD_Histogram";
    pub const BB_UPPER: &str = "BB_Upper";
    pub const BB_MIDDLE: &str = "BB_Middle";
    pub const BB_LOWER: &str = "BB_Lower";
    pub const STOCH_K: &str = "Stoch_K";
    pub const STOCH_D: &str = "Stoch_D";
    pub const WILLIAMS_R: &str = "Williams_R";
    pub const ATR: &str = "ATR";
}

// =============================================================================
// Parameters
// =============================================================================

fn default_sma_short() -> usize {
    20
}

fn default_sma_long() -> usize {
    50
}

fn default_ema_fast() -> usize {
    12
}

fn default_ema_slow() -> usize {
    26
}

fn default_rsi_window() -> usize {
    14
}

fn default_macd_signal() -> usize {
    9
}

fn default_bb_window() -> usize {
    20
}

fn default_bb_num_std() -> f64 {
    2.0
}

fn default_stoch_k() -> usize {
    14
}

fn default_stoch_d() -> usize {
    3
}

fn default_period_14() -> usize {
    14
}

/// Window lengths and smoothing spans. Column names keep their vocabulary
/// names (e.g. `SMA_20`) even when a window is overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_sma_short")]
    pub sma_short: usize,
    #[serde(default = "default_sma_long")]
    pub sma_long: usize,
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,
    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,
    #[serde(default = "default_ema_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_ema_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bb_window")]
    pub bb_window: usize,
    #[serde(default = "default_bb_num_std")]
    pub bb_num_std: f64,
    #[serde(default = "default_stoch_k")]
    pub stoch_k: usize,
    #[serde(default = "default_stoch_d")]
    pub stoch_d: usize,
    #[serde(default = "default_period_14")]
    pub williams_period: usize,
    #[serde(default = "default_period_14")]
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_short: default_sma_short(),
            sma_long: default_sma_long(),
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            rsi_window: default_rsi_window(),
            macd_fast: default_ema_fast(),
            macd_slow: default_ema_slow(),
            macd_signal: default_macd_signal(),
            bb_window: default_bb_window(),
            bb_num_std: default_bb_num_std(),
            stoch_k: default_stoch_k(),
            stoch_d: default_stoch_d(),
            williams_period: default_period_14(),
            atr_period: default_period_14(),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// A de-duplicated indicator selection plus parameter overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub kinds: BTreeSet<IndicatorKind>,
    #[serde(default)]
    pub params: IndicatorParams,
}

impl IndicatorRequest {
    pub fn new(kinds: impl IntoIterator<Item = IndicatorKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            params: IndicatorParams::default(),
        }
    }

    pub fn with_params(mut self, params: IndicatorParams) -> Self {
        self.params = params;
        self
    }

    /// Parse indicator names, ignoring any that are not in the vocabulary so
    /// that forward-compatible selection lists keep working.
    pub fn parse<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kinds = BTreeSet::new();
        for name in names {
            match name.as_ref().parse::<IndicatorKind>() {
                Ok(kind) => {
                    kinds.insert(kind);
                }
                Err(_) => debug!(name = name.as_ref(), "ignoring unknown indicator"),
            }
        }
        Self::new(kinds)
    }

    /// Parse indicator names, rejecting the first unknown one.
    pub fn parse_strict<I, S>(names: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kinds = names
            .into_iter()
            .map(|n| n.as_ref().parse::<IndicatorKind>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self::new(kinds))
    }

    pub fn contains(&self, kind: IndicatorKind) -> bool {
        self.kinds.contains(&kind)
    }
}

// =============================================================================
// Augmented series
// =============================================================================

/// One named output column, index-aligned with the bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorColumn {
    pub name: &'static str,
    pub values: Column,
}

/// The input bars plus the computed indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentedSeries {
    pub bars: Vec<PriceBar>,
    pub columns: Vec<IndicatorColumn>,
}

impl AugmentedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.values)
    }

    /// The value of `name` in the most recent row. `None` when the column is
    /// absent, the series is empty, or the latest point is undefined.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name)?.last().copied().flatten()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    fn push(&mut self, name: &'static str, values: Column) {
        debug_assert_eq!(values.len(), self.bars.len(), "column {name} misaligned");
        self.columns.push(IndicatorColumn { name, values });
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Compute every requested indicator over `series`.
pub fn compute(series: &PriceSeries, request: &IndicatorRequest) -> AugmentedSeries {
    let p = &request.params;
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    let mut out = AugmentedSeries {
        bars: series.bars().to_vec(),
        columns: Vec::new(),
    };

    for kind in &request.kinds {
        match kind {
            IndicatorKind::Sma20 => {
                out.push(columns::SMA_20, indicators::sma::calculate_sma(&closes, p.sma_short));
            }
            IndicatorKind::Sma50 => {
                out.push(columns::SMA_50, indicators::sma::calculate_sma(&closes, p.sma_long));
            }
            IndicatorKind::Ema12 => {
                out.push(columns::EMA_12, indicators::ema::calculate_ema(&closes, p.ema_fast));
            }
            IndicatorKind::Ema26 => {
                out.push(columns::EMA_26, indicators::ema::calculate_ema(&closes, p.ema_slow));
            }
            IndicatorKind::Rsi => {
                out.push(columns::RSI, indicators::rsi::calculate_rsi(&closes, p.rsi_window));
            }
            IndicatorKind::Macd => {
                let macd = indicators::macd::calculate_macd(
                    &closes,
                    p.macd_fast,
                    p.macd_slow,
                    p.macd_signal,
                );
                out.push(columns::MACD, macd.line);
                out.push(columns::MACD_SIGNAL, macd.signal);
                out.push(columns::MACD_HISTOGRAM, macd.histogram);
            }
            IndicatorKind::BollingerBands => {
                let bb = indicators::bollinger::calculate_bollinger(
                    &closes,
                    p.bb_window,
                    p.bb_num_std,
                );
                out.push(columns::BB_UPPER, bb.upper);
                out.push(columns::BB_MIDDLE, bb.middle);
                out.push(columns::BB_LOWER, bb.lower);
            }
            IndicatorKind::Stochastic => {
                let st = indicators::stochastic::calculate_stochastic(
                    &highs,
                    &lows,
                    &closes,
                    p.stoch_k,
                    p.stoch_d,
                );
                out.push(columns::STOCH_K, st.k);
                out.push(columns::STOCH_D, st.d);
            }
            IndicatorKind::WilliamsR => {
                out.push(
                    columns::WILLIAMS_R,
                    indicators::williams_r::calculate_williams_r(
                        &highs,
                        &lows,
                        &closes,
                        p.williams_period,
                    ),
                );
            }
            IndicatorKind::Atr => {
                out.push(
                    columns::ATR,
                    indicators::atr::calculate_atr(&highs, &lows, &closes, p.atr_period),
                );
            }
        }
    }

    debug!(
        rows = out.len(),
        columns = out.columns.len(),
        "indicator pipeline complete"
    );

    out
}

/// Normalize raw rows, then compute. Structural malformation fails before any
/// indicator runs.
pub fn compute_raw(rows: &[RawBar], request: &IndicatorRequest) -> Result<AugmentedSeries, SeriesError> {
    let series = PriceSeries::from_raw(rows)?;
    Ok(compute(&series, request))
}
