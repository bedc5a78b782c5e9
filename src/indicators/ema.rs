// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   alpha  = 2 / (span + 1)
//   EMA_0  = value_0
//   EMA_t  = value_t * alpha + EMA_{t-1} * (1 - alpha)
//
// No bias adjustment is applied, so every point is defined from index 0.
// =============================================================================

use super::window::{lift, Column};

/// Compute the EMA column for `values` with the given `span`.
///
/// # Edge cases
/// - `span == 0` => every point undefined
/// - a non-finite value breaks the recurrence: that point and every later
///   point are undefined
pub fn calculate_ema(values: &[f64], span: usize) -> Column {
    ema_of_column(&lift(values), span)
}

/// EMA over a column that may already contain undefined points (used for the
/// MACD signal line). The recurrence is seeded with the first point; once an
/// undefined point is met the remainder of the column is undefined.
pub fn ema_of_column(values: &[Option<f64>], span: usize) -> Column {
    let mut out = vec![None; values.len()];
    if span == 0 {
        return out;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = *value else {
            break;
        };
        let ema = match prev {
            None => v,
            Some(p) => v * alpha + p * (1.0 - alpha),
        };
        if !ema.is_finite() {
            break;
        }
        out[i] = Some(ema);
        prev = Some(ema);
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }

    #[test]
    fn ema_seeded_with_first_observation() {
        let ema = calculate_ema(&[42.0, 40.0], 12);
        assert_eq!(ema[0], Some(42.0));
    }

    #[test]
    fn ema_matches_direct_recurrence() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let span = 12;
        let alpha = 2.0 / (span as f64 + 1.0);
        let ema = calculate_ema(&closes, span);

        assert_eq!(ema.len(), closes.len());
        let mut expected = closes[0];
        assert_eq!(ema[0], Some(expected));
        for i in 1..closes.len() {
            expected = alpha * closes[i] + (1.0 - alpha) * expected;
            let got = ema[i].unwrap();
            assert!((got - expected).abs() < 1e-12, "index {i}: got {got}, expected {expected}");
        }
    }

    #[test]
    fn ema_span_one_tracks_input() {
        let closes = vec![3.0, 7.0, 5.0];
        let ema = calculate_ema(&closes, 1);
        assert_eq!(ema, vec![Some(3.0), Some(7.0), Some(5.0)]);
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let ema = calculate_ema(&[1.0, 2.0, f64::NAN, 4.0], 3);
        assert!(ema[0].is_some());
        assert!(ema[1].is_some());
        assert_eq!(&ema[2..], &[None, None]);
    }
}
