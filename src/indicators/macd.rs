// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line      = EMA(close, fast) - EMA(close, slow)
//   signal    = EMA(line, signal)
//   histogram = line - signal
//
// Every EMA is seeded with its first input, so all three outputs are defined
// from index 0; values before roughly `slow + signal` points are numerically
// unsettled but still reported.
// =============================================================================

use serde::Serialize;

use super::ema::{calculate_ema, ema_of_column};
use super::window::Column;

/// The three MACD outputs, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub line: Column,
    pub signal: Column,
    pub histogram: Column,
}

/// Compute MACD for `closes`.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let line: Column = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal = ema_of_column(&line, signal);

    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0 + i as f64 * 0.2)
            .collect()
    }

    #[test]
    fn macd_outputs_share_input_length() {
        let closes = wave(60);
        let macd = calculate_macd(&closes, 12, 26, 9);
        assert_eq!(macd.line.len(), 60);
        assert_eq!(macd.signal.len(), 60);
        assert_eq!(macd.histogram.len(), 60);
    }

    #[test]
    fn macd_histogram_identity_is_exact() {
        let closes = wave(80);
        let macd = calculate_macd(&closes, 12, 26, 9);
        for i in 0..closes.len() {
            let (l, s, h) = (macd.line[i].unwrap(), macd.signal[i].unwrap(), macd.histogram[i].unwrap());
            assert_eq!(h, l - s, "index {i}");
        }
    }

    #[test]
    fn macd_defined_from_first_point() {
        let macd = calculate_macd(&[10.0, 11.0], 12, 26, 9);
        assert_eq!(macd.line[0], Some(0.0));
        assert_eq!(macd.signal[0], Some(0.0));
        assert_eq!(macd.histogram[0], Some(0.0));
    }

    #[test]
    fn macd_rising_series_is_positive() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let macd = calculate_macd(&closes, 12, 26, 9);
        assert!(macd.line[99].unwrap() > 0.0);
        assert!(macd.line[99].unwrap() > macd.signal[99].unwrap());
    }

    #[test]
    fn macd_zero_span_is_undefined() {
        let macd = calculate_macd(&[1.0, 2.0, 3.0], 0, 26, 9);
        assert!(macd.line.iter().all(Option::is_none));
        assert!(macd.histogram.iter().all(Option::is_none));
    }
}
