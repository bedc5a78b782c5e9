// =============================================================================
// Relative Strength Index (RSI) — simple rolling averages
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — delta_t = close_t - close_{t-1} (undefined at t = 0).
// Step 2 — avg_gain / avg_loss = arithmetic mean of the positive parts / the
//          magnitudes of the negative parts of the trailing `window` deltas.
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// The first `window` points are undefined: index `window` is the first one
// with `window` deltas behind it.
// =============================================================================

use super::window::{rolling_mean, Column};

/// Compute the RSI column for `closes` over `window` deltas.
///
/// # Edge cases
/// - `window == 0` => every point undefined
/// - average loss zero, average gain positive => exactly 100
/// - average gain and average loss both zero (flat market) => undefined
/// - RSI is bounded in [0, 100] wherever it is defined
pub fn calculate_rsi(closes: &[f64], window: usize) -> Column {
    let n = closes.len();
    if window == 0 || n == 0 {
        return vec![None; n];
    }

    // --- Split deltas into gains and losses ---------------------------------
    let mut gains: Column = Vec::with_capacity(n);
    let mut losses: Column = Vec::with_capacity(n);
    gains.push(None);
    losses.push(None);
    for w in closes.windows(2) {
        let delta = w[1] - w[0];
        if delta.is_finite() {
            gains.push(Some(delta.max(0.0)));
            losses.push(Some((-delta).max(0.0)));
        } else {
            gains.push(None);
            losses.push(None);
        }
    }

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => rsi_from_averages(*g, *l),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Both averages zero has no direction and is undefined rather than neutral.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        return None;
    }

    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    rsi.is_finite().then_some(rsi)
}
