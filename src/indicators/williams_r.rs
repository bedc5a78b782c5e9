// =============================================================================
// Williams %R
// =============================================================================
//
//   %R = -100 * (HH - close) / (HH - LL)
//
// over the trailing `period` bars. Ranges from -100 (close at the low) to 0
// (close at the high). Undefined for the first `period - 1` points and on a
// flat range.

use super::window::{checked_div, lift, rolling_max, rolling_min, Column};

pub fn calculate_williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Column {
    let n = close.len();
    if high.len() != n || low.len() != n {
        return vec![None; n];
    }

    let lowest = rolling_min(&lift(low), period);
    let highest = rolling_max(&lift(high), period);

    (0..n)
        .map(|i| {
            let (ll, hh) = (lowest[i]?, highest[i]?);
            let c = Some(close[i]).filter(|c| c.is_finite())?;
            checked_div(hh - c, hh - ll).map(|ratio| -100.0 * ratio)
        })
        .collect()
}
