// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = mean(close_{t-window+1} .. close_t)
//
// Partial windows are allowed: before `window` observations exist, the value
// is the mean of everything seen so far, so the first point equals the first
// close.
// =============================================================================

use super::window::Column;

/// Compute the SMA column for `closes` over `window`.
///
/// # Edge cases
/// - `window == 0` => every point undefined
/// - a non-finite close makes every window that contains it undefined
pub fn calculate_sma(closes: &[f64], window: usize) -> Column {
    if window == 0 {
        return vec![None; closes.len()];
    }

    let mut out = Vec::with_capacity(closes.len());
    for end in 0..closes.len() {
        let start = (end + 1).saturating_sub(window);
        let slice = &closes[start..=end];
        let value = if slice.iter().all(|v| v.is_finite()) {
            Some(slice.iter().sum::<f64>() / slice.len() as f64)
        } else {
            None
        };
        out.push(value);
    }
    out
}
