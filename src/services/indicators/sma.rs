//! Rolling window helpers (simple moving average and rolling sum).

/// Rolling sum over a full window. Positions before the window fills, and
/// windows containing an undefined input, are undefined.
///
/// Each window is summed directly so a window of exact zeros yields exactly
/// zero.
pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i]
                .iter()
                .try_fold(0.0, |acc, v| v.map(|v| acc + v))
        })
        .collect()
}

/// Simple moving average over a full window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let defined: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling_sum(&defined, window)
        .into_iter()
        .map(|sum| sum.map(|s| s / window as f64))
        .collect()
}
