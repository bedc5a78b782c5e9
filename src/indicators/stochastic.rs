// =============================================================================
// Stochastic Oscillator (%K / %D)
// =============================================================================
//
//   %K = 100 * (close - LL) / (HH - LL)
//   %D = SMA(%K, d_period)           (full window required)
//
// where LL / HH are the lowest low / highest high of the trailing `k_period`
// bars. A flat range (HH == LL) leaves %K undefined, and every %D window
// touching that point undefined too.

use serde::Serialize;

use super::window::{checked_div, lift, rolling_max, rolling_mean, rolling_min, Column};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StochasticSeries {
    pub k: Column,
    pub d: Column,
}

/// Compute %K and %D. Mismatched input lengths yield all-undefined columns of
/// `close.len()`.
pub fn calculate_stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticSeries {
    let n = close.len();
    if high.len() != n || low.len() != n {
        return StochasticSeries {
            k: vec![None; n],
            d: vec![None; n],
        };
    }

    let lowest = rolling_min(&lift(low), k_period);
    let highest = rolling_max(&lift(high), k_period);

    let k: Column = (0..n)
        .map(|i| {
            let (ll, hh) = (lowest[i]?, highest[i]?);
            let c = Some(close[i]).filter(|c| c.is_finite())?;
            checked_div(c - ll, hh - ll).map(|ratio| 100.0 * ratio)
        })
        .collect();

    let d = rolling_mean(&k, d_period);

    StochasticSeries { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stochastic_known_values() {
        let high = [10.0, 12.0, 11.0, 13.0];
        let low = [8.0, 9.0, 9.5, 10.0];
        let close = [9.0, 11.0, 10.0, 12.5];
        let st = calculate_stochastic(&high, &low, &close, 3, 2);

        assert_eq!(st.k[0], None);
        assert_eq!(st.k[1], None);
        // idx 2: LL = 8, HH = 12 => 100 * 2 / 4 = 50
        assert_eq!(st.k[2], Some(50.0));
        // idx 3: LL = 9, HH = 13 => 100 * 3.5 / 4 = 87.5
        assert_eq!(st.k[3], Some(87.5));

        assert_eq!(st.d[2], None);
        assert_eq!(st.d[3], Some((50.0 + 87.5) / 2.0));
    }

    #[test]
    fn stochastic_flat_range_is_undefined() {
        let flat = [5.0; 6];
        let st = calculate_stochastic(&flat, &flat, &flat, 3, 3);
        assert!(st.k.iter().all(Option::is_none));
        assert!(st.d.iter().all(Option::is_none));
    }

    #[test]
    fn stochastic_bounded() {
        let close: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.5).sin() * 10.0).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 2.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 2.0).collect();
        let st = calculate_stochastic(&high, &low, &close, 14, 3);
        assert!(st.k[12].is_none());
        assert!(st.k[13].is_some());
        assert!(st.d[14].is_none());
        assert!(st.d[15].is_some());
        for v in st.k.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn stochastic_mismatched_lengths() {
        let st = calculate_stochastic(&[1.0], &[1.0, 2.0], &[1.0, 2.0], 1, 1);
        assert_eq!(st.k, vec![None, None]);
    }
}
