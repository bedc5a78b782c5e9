// =============================================================================
// Average True Range (ATR) — simple rolling mean
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar after the first:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
// The first bar has no previous close, so its TR is just H - L.
//
// ATR is the arithmetic mean of the trailing `period` TR values, undefined
// for the first `period - 1` points.
//
// Default period: 14
// =============================================================================

use super::window::{rolling_mean, Column};

/// True Range column. Index 0 falls back to the bar's own high-low range.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Column {
    let n = close.len();
    if high.len() != n || low.len() != n {
        return vec![None; n];
    }

    let mut out = Vec::with_capacity(n);
    if n > 0 {
        let hl = high[0] - low[0];
        out.push(hl.is_finite().then_some(hl));
    }
    for i in 1..n {
        let prev_close = close[i - 1];

        let hl = high[i] - low[i];
        let hc = (high[i] - prev_close).abs();
        let lc = (low[i] - prev_close).abs();

        let tr = hl.max(hc).max(lc);
        // f64::max ignores a NaN operand, so check every input explicitly.
        let finite = [hl, hc, lc].iter().all(|v| v.is_finite());
        out.push(finite.then_some(tr));
    }
    out
}

/// Compute the ATR column for the given bars.
///
/// # Edge cases
/// - `period == 0` => every point undefined
/// - fewer than `period` bars => every point undefined
/// - a non-finite input poisons the TR at that bar and every window over it
pub fn calculate_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Column {
    rolling_mean(&true_range(high, low, close), period)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Split `(high, low, close)` triples into columns.
    fn columns(bars: &[(f64, f64, f64)]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            bars.iter().map(|b| b.0).collect(),
            bars.iter().map(|b| b.1).collect(),
            bars.iter().map(|b| b.2).collect(),
        )
    }

    #[test]
    fn atr_period_zero() {
        let (h, l, c) = columns(&[(105.0, 95.0, 102.0); 20]);
        assert!(calculate_atr(&h, &l, &c, 0).iter().all(Option::is_none));
    }

    #[test]
    fn atr_insufficient_data() {
        let (h, l, c) = columns(&[(105.0, 95.0, 102.0); 13]);
        assert!(calculate_atr(&h, &l, &c, 14).iter().all(Option::is_none));
    }

    #[test]
    fn atr_undefined_prefix_is_period_minus_one() {
        let (h, l, c) = columns(&[
            (102.0, 98.0, 101.0),
            (104.0, 99.0, 103.0),
            (106.0, 100.0, 105.0),
            (108.0, 102.0, 107.0),
        ]);
        let atr = calculate_atr(&h, &l, &c, 3);
        assert_eq!(atr[..2], [None, None]);
        // TRs: 4, 5, 6, 6
        assert!((atr[2].unwrap() - 5.0).abs() < 1e-12);
        assert!((atr[3].unwrap() - 17.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn atr_first_window_includes_first_bar_range() {
        let h = [11.0, 12.0, 13.0, 14.0];
        let l = [9.0, 10.0, 11.0, 12.0];
        let c = [10.0, 11.0, 12.0, 13.0];
        assert_eq!(calculate_atr(&h, &l, &c, 3), vec![None, None, Some(2.0), Some(2.0)]);
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap scenario: |H - prevClose| > H - L
        let (h, l, c) = columns(&[(105.0, 95.0, 95.0), (115.0, 108.0, 112.0)]);
        let tr = true_range(&h, &l, &c);
        assert_eq!(tr, vec![Some(10.0), Some(20.0)]);
    }

    #[test]
    fn atr_constant_range() {
        let bars: Vec<(f64, f64, f64)> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                (base + 5.0, base - 5.0, base)
            })
            .collect();
        let (h, l, c) = columns(&bars);
        let atr = calculate_atr(&h, &l, &c, 14);
        let last = atr[29].unwrap();
        assert!((last - 10.0).abs() < 1e-9, "expected ATR of 10.0, got {last}");
    }

    #[test]
    fn atr_flat_close_only_is_zero() {
        let flat = vec![50.0; 20];
        let atr = calculate_atr(&flat, &flat, &flat, 14);
        assert_eq!(atr[19], Some(0.0));
    }

    #[test]
    fn atr_nan_poisons_windows() {
        let (h, l, c) = columns(&[
            (105.0, 95.0, 100.0),
            (f64::NAN, 95.0, 100.0),
            (105.0, 95.0, 100.0),
            (105.0, 95.0, 100.0),
            (105.0, 95.0, 100.0),
        ]);
        let atr = calculate_atr(&h, &l, &c, 2);
        assert_eq!(atr[2], None);
        assert_eq!(atr[3], Some(10.0));
    }
}
