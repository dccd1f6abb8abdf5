//! Exponential Moving Average (EMA), weighted-average form.

/// Weighted-average EMA over `values` with the given span.
///
/// At bar `t` the value is `Σ (1-α)^i · x[t-i] / Σ (1-α)^i` for `i = 0..=t`,
/// with `α = 2 / (span + 1)`. Unlike the recursive form seeded from an SMA,
/// it is defined from the very first value and converges to the recursive
/// EMA as history accumulates.
pub fn weighted_ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    values
        .iter()
        .map(|&value| {
            numerator = value + decay * numerator;
            denominator = 1.0 + decay * denominator;
            numerator / denominator
        })
        .collect()
}
