// =============================================================================
// Price Analytics — performance statistics and sentiment
// =============================================================================
//
// Descriptive statistics over the close series that accompany the indicator
// charts: percentage change, annualised rolling volatility, Sharpe ratio,
// maximum drawdown, simple price targets, a simplified Fear & Greed index and
// the cross-coin comparison helpers.
//
// Crypto trades every day, so annualisation uses 365 periods.
// =============================================================================

use serde::Serialize;

use crate::indicators::window::{mean, rolling_sample_std, sample_std, Column};
use crate::types::Sentiment;

/// Periods per year used for annualisation.
pub const PERIODS_PER_YEAR: f64 = 365.0;

/// Percentage change from `old` to `new`. Zero when `old` is zero or either
/// side is not finite.
pub fn percentage_change(old: f64, new: f64) -> f64 {
    if !old.is_finite() || !new.is_finite() || old == 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

/// Simple returns `p_t / p_{t-1} - 1`, index-aligned (index 0 undefined).
pub fn simple_returns(prices: &[f64]) -> Column {
    let mut out = Vec::with_capacity(prices.len());
    if !prices.is_empty() {
        out.push(None);
    }
    for w in prices.windows(2) {
        let r = if w[0] == 0.0 { f64::NAN } else { w[1] / w[0] - 1.0 };
        out.push(r.is_finite().then_some(r));
    }
    out
}

/// Annualised rolling volatility: sample std of simple returns over a full
/// `window`, scaled by √365.
pub fn rolling_volatility(prices: &[f64], window: usize) -> Column {
    rolling_sample_std(&simple_returns(prices), window)
        .into_iter()
        .map(|v| v.map(|s| s * PERIODS_PER_YEAR.sqrt()))
        .collect()
}

/// Annualised Sharpe ratio of the price path.
///
/// Returns 0 when there are no returns or the returns have zero volatility.
pub fn sharpe_ratio(prices: &[f64], risk_free_rate: f64) -> f64 {
    let returns: Vec<f64> = simple_returns(prices).into_iter().flatten().collect();
    let Some(mean_return) = mean(&returns) else {
        return 0.0;
    };

    let annual_return = (1.0 + mean_return).powf(PERIODS_PER_YEAR) - 1.0;
    let annual_volatility = match sample_std(&returns) {
        Some(s) => s * PERIODS_PER_YEAR.sqrt(),
        None => return 0.0,
    };

    if annual_volatility == 0.0 {
        return 0.0;
    }

    let sharpe = (annual_return - risk_free_rate) / annual_volatility;
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Maximum drawdown in percent (a value <= 0). `None` for an empty input.
pub fn max_drawdown(prices: &[f64]) -> Option<f64> {
    let mut running_max = f64::NEG_INFINITY;
    let mut worst: Option<f64> = None;

    for &p in prices {
        if !p.is_finite() {
            continue;
        }
        running_max = running_max.max(p);
        if running_max <= 0.0 {
            continue;
        }
        let dd = (p - running_max) / running_max;
        worst = Some(worst.map_or(dd, |w: f64| w.min(dd)));
    }

    worst.map(|w| w * 100.0)
}

// =============================================================================
// Price targets
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTargets {
    pub current: f64,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
}

/// Split known levels into supports (below `current`) and resistances (at or
/// above). Without levels, falls back to ±5 / 10 / 15 %.
pub fn price_targets(current: f64, levels: Option<&[f64]>) -> PriceTargets {
    match levels {
        Some(levels) if !levels.is_empty() => {
            let (support_levels, resistance_levels): (Vec<f64>, Vec<f64>) =
                levels.iter().partition(|&&level| level < current);
            PriceTargets {
                current,
                support_levels,
                resistance_levels,
            }
        }
        _ => PriceTargets {
            current,
            support_levels: vec![current * 0.95, current * 0.90, current * 0.85],
            resistance_levels: vec![current * 1.05, current * 1.10, current * 1.15],
        },
    }
}

// =============================================================================
// Fear & Greed
// =============================================================================

/// Result of [`fear_greed_index`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FearGreed {
    pub index: f64,
    pub sentiment: Sentiment,
}

/// Simplified Fear & Greed index.
///
/// Inputs are normalised onto 0..=100 and blended:
///   RSI 30 %, volatility 25 % (lower is greedier), volume change 25 %,
///   price change 20 %.
///
/// `volatility`, `volume_change` and `price_change` are percentages.
pub fn fear_greed_index(rsi: f64, volatility: f64, volume_change: f64, price_change: f64) -> FearGreed {
    let rsi_score = if (0.0..=100.0).contains(&rsi) { rsi } else { 50.0 };
    let vol_score = clamp_score(100.0 - volatility * 2.0);
    let volume_score = clamp_score(50.0 + volume_change);
    let price_score = clamp_score(50.0 + price_change);

    let raw = rsi_score * 0.3 + vol_score * 0.25 + volume_score * 0.25 + price_score * 0.2;

    // The label follows the unrounded score; only the reported index is rounded.
    FearGreed {
        index: (raw * 10.0).round() / 10.0,
        sentiment: sentiment_for(raw),
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        50.0
    }
}

fn sentiment_for(index: f64) -> Sentiment {
    if index >= 75.0 {
        Sentiment::ExtremeGreed
    } else if index >= 55.0 {
        Sentiment::Greed
    } else if index >= 45.0 {
        Sentiment::Neutral
    } else if index >= 25.0 {
        Sentiment::Fear
    } else {
        Sentiment::ExtremeFear
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Cumulative percentage change of each point relative to the first one.
/// Empty when the first price is not positive.
pub fn normalized_change(prices: &[f64]) -> Vec<f64> {
    match prices.first() {
        Some(&base) if base > 0.0 && base.is_finite() => {
            prices.iter().map(|p| (p / base - 1.0) * 100.0).collect()
        }
        _ => Vec::new(),
    }
}

/// Pearson correlation of two equal-length series.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (mean_a, mean_b) = (mean(a)?, mean(b)?);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let r = cov / (var_a * var_b).sqrt();
    r.is_finite().then_some(r)
}

// =============================================================================
// Aggregate
// =============================================================================

/// Statistics shown beside the price chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub first_close: f64,
    pub last_close: f64,
    pub period_change_pct: f64,
    pub volatility: Option<f64>,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: Option<f64>,
}

/// Compute [`PerformanceMetrics`] for `closes`. `None` for an empty input.
pub fn performance(closes: &[f64], volatility_window: usize, risk_free_rate: f64) -> Option<PerformanceMetrics> {
    let first_close = *closes.first()?;
    let last_close = *closes.last()?;

    Some(PerformanceMetrics {
        first_close,
        last_close,
        period_change_pct: percentage_change(first_close, last_close),
        volatility: rolling_volatility(closes, volatility_window)
            .last()
            .copied()
            .flatten(),
        sharpe_ratio: sharpe_ratio(closes, risk_free_rate),
        max_drawdown_pct: max_drawdown(closes),
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_change_basic_and_guarded() {
        assert!((percentage_change(100.0, 110.0) - 10.0).abs() < 1e-12);
        assert_eq!(percentage_change(0.0, 110.0), 0.0);
        assert_eq!(percentage_change(f64::NAN, 110.0), 0.0);
    }

    #[test]
    fn returns_are_aligned() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((r[2].unwrap() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn volatility_of_constant_growth_is_zero() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let vol = rolling_volatility(&prices, 30);
        assert!(vol[29].is_none());
        assert!(vol[30].unwrap().abs() < 1e-9);
    }

    #[test]
    fn sharpe_zero_without_returns() {
        assert_eq!(sharpe_ratio(&[], 0.02), 0.0);
        assert_eq!(sharpe_ratio(&[100.0], 0.02), 0.0);
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], 0.02), 0.0);
    }

    #[test]
    fn sharpe_sign_follows_trend() {
        let up: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 + (i % 3) as f64).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        assert!(sharpe_ratio(&up, 0.02) > 0.0);
        assert!(sharpe_ratio(&down, 0.02) < 0.0);
    }

    #[test]
    fn max_drawdown_known_value() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]).unwrap();
        assert!((dd + 25.0).abs() < 1e-12, "got {dd}");
        assert_eq!(max_drawdown(&[]), None);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), Some(0.0));
    }

    #[test]
    fn price_targets_partition_levels() {
        let t = price_targets(100.0, Some(&[90.0, 100.0, 120.0, 95.0]));
        assert_eq!(t.support_levels, vec![90.0, 95.0]);
        assert_eq!(t.resistance_levels, vec![100.0, 120.0]);

        let t = price_targets(100.0, None);
        assert_eq!(t.support_levels.len(), 3);
        assert!((t.resistance_levels[0] - 105.0).abs() < 1e-9);
    }

    #[test]
    fn fear_greed_bands() {
        let neutral = fear_greed_index(50.0, 25.0, 0.0, 0.0);
        // 15 + 12.5 + 12.5 + 10 = 50
        assert_eq!(neutral.index, 50.0);
        assert_eq!(neutral.sentiment, Sentiment::Neutral);

        let greed = fear_greed_index(90.0, 0.0, 50.0, 50.0);
        assert_eq!(greed.index, 97.0);
        assert_eq!(greed.sentiment, Sentiment::ExtremeGreed);

        let fear = fear_greed_index(10.0, 60.0, -50.0, -50.0);
        assert_eq!(fear.index, 3.0);
        assert_eq!(fear.sentiment, Sentiment::ExtremeFear);
    }

    #[test]
    fn fear_greed_label_uses_unrounded_score() {
        // raw = 83.2 * 0.3 + 100 * 0.25 + 50 * 0.25 + 62.5 * 0.2 = 74.96
        let fg = fear_greed_index(83.2, 0.0, 0.0, 12.5);
        assert!((fg.index - 75.0).abs() < 1e-9);
        assert_eq!(fg.sentiment, Sentiment::Greed);
    }

    #[test]
    fn fear_greed_out_of_range_rsi_is_neutral_input() {
        let a = fear_greed_index(150.0, 25.0, 0.0, 0.0);
        let b = fear_greed_index(50.0, 25.0, 0.0, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn normalized_change_is_relative_to_first() {
        let n = normalized_change(&[50.0, 55.0, 45.0]);
        assert_eq!(n.len(), 3);
        assert_eq!(n[0], 0.0);
        assert!((n[1] - 10.0).abs() < 1e-9);
        assert!((n[2] + 10.0).abs() < 1e-9);
        assert!(normalized_change(&[0.0, 1.0]).is_empty());
        assert!(normalized_change(&[]).is_empty());
    }

    #[test]
    fn correlation_bounds_and_guards() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let up = [10.0, 20.0, 30.0, 40.0];
        let down = [4.0, 3.0, 2.0, 1.0];
        assert!((correlation(&a, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((correlation(&a, &down).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(correlation(&a, &[1.0, 2.0]), None);
        assert_eq!(correlation(&a, &[5.0; 4]), None);
        assert_eq!(correlation(&[1.0], &[1.0]), None);
    }

    #[test]
    fn performance_summary() {
        let closes = vec![100.0, 110.0, 105.0];
        let m = performance(&closes, 30, 0.02).unwrap();
        assert!((m.period_change_pct - 5.0).abs() < 1e-9);
        assert_eq!(m.volatility, None);
        assert!(performance(&[], 30, 0.02).is_none());
    }
}
