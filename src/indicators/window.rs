// =============================================================================
// Rolling-window primitives shared by the indicator functions
// =============================================================================
//
// Every helper returns a column of the same length as its input. A position
// is `None` when its window is incomplete or contains an undefined or
// non-finite value.

/// An index-aligned indicator column. `None` marks an undefined point.
pub type Column = Vec<Option<f64>>;

/// Lift raw values into a column, mapping non-finite values to `None`.
pub fn lift(values: &[f64]) -> Column {
    values
        .iter()
        .map(|&v| if v.is_finite() { Some(v) } else { None })
        .collect()
}

/// Apply `f` to every complete trailing window of length `window`.
///
/// `f` receives the window's values (oldest first) and may itself return
/// `None` for a numerically undefined result.
pub fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Column
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let mut buf: Vec<f64> = Vec::with_capacity(window);
    for end in window - 1..values.len() {
        buf.clear();
        buf.extend(values[end + 1 - window..=end].iter().map_while(|v| *v));
        if buf.len() == window {
            out[end] = f(&buf).filter(|v| v.is_finite());
        }
    }
    out
}

/// Arithmetic mean over a complete window.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, mean)
}

/// Sample (n − 1) standard deviation over a complete window. Undefined for
/// windows shorter than two.
pub fn rolling_sample_std(values: &[Option<f64>], window: usize) -> Column {
    if window < 2 {
        return vec![None; values.len()];
    }
    rolling(values, window, sample_std)
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Column {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Divide, returning `None` when the denominator is zero or the result is not
/// finite.
pub fn checked_div(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let q = num / den;
    q.is_finite().then_some(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_requires_full_window() {
        let col = rolling_mean(&lift(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(col, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn undefined_value_poisons_only_its_windows() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let col = rolling_mean(&values, 2);
        assert_eq!(col, vec![None, None, None, Some(3.5), Some(4.5)]);
    }

    #[test]
    fn lift_maps_non_finite_to_none() {
        assert_eq!(lift(&[1.0, f64::NAN, f64::INFINITY]), vec![Some(1.0), None, None]);
    }

    #[test]
    fn zero_window_is_all_undefined() {
        assert_eq!(rolling_mean(&lift(&[1.0, 2.0]), 0), vec![None, None]);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        // Sample std of [2, 4, 4, 4, 5, 5, 7, 9] = sqrt(32 / 7).
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = sample_std(&values).unwrap();
        assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(rolling_sample_std(&lift(&values), 1), vec![None; 8]);
    }

    #[test]
    fn min_max_over_window() {
        let values = lift(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        assert_eq!(rolling_min(&values, 3), vec![None, None, Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(rolling_max(&values, 3), vec![None, None, Some(4.0), Some(4.0), Some(5.0)]);
    }

    #[test]
    fn checked_div_guards_zero() {
        assert_eq!(checked_div(1.0, 0.0), None);
        assert_eq!(checked_div(1.0, 4.0), Some(0.25));
    }
}
