// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the sample standard deviation of
// the trailing `window` closes.
//
// The middle band follows SMA's partial-window rule and is defined from the
// first point; the bands need a full window and are undefined for the first
// `window - 1` points.

use serde::Serialize;

use super::sma::calculate_sma;
use super::window::{lift, rolling_sample_std, Column};

/// Upper, middle and lower bands, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerSeries {
    pub upper: Column,
    pub middle: Column,
    pub lower: Column,
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// A negative or non-finite `num_std` leaves both outer bands undefined.
pub fn calculate_bollinger(closes: &[f64], window: usize, num_std: f64) -> BollingerSeries {
    let middle = calculate_sma(closes, window);
    let std = rolling_sample_std(&lift(closes), window);

    let valid_k = num_std.is_finite() && num_std >= 0.0;
    let band = |sign: f64| -> Column {
        middle
            .iter()
            .zip(&std)
            .map(|(m, s)| {
                if !valid_k {
                    return None;
                }
                Some((*m)? + sign * num_std * (*s)?)
            })
            .collect()
    };

    let upper = band(1.0);
    let lower = band(-1.0);

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}
