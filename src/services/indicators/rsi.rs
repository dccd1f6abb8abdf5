//! Relative Strength Index (RSI) indicator.

use super::sma::rolling_mean;
use super::{oscillator, Indicator};
use crate::types::{Bar, IndicatorSet};

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses.
/// Average gain and loss are simple rolling means (not Wilder smoothing).
/// Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A window with no movement at all is undefined rather than 50.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Per-bar gains and losses. Bar 0 has no delta and contributes zero to both.
    fn gains_and_losses(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        let mut gains = Vec::with_capacity(bars.len());
        let mut losses = Vec::with_capacity(bars.len());

        if !bars.is_empty() {
            gains.push(0.0);
            losses.push(0.0);
        }
        for pair in bars.windows(2) {
            let change = pair[1].close - pair[0].close;
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        (gains, losses)
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &str {
        "rsi"
    }

    fn name(&self) -> &str {
        "RSI"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn apply(&self, bars: &[Bar], sets: &mut [IndicatorSet]) {
        let (gains, losses) = Self::gains_and_losses(bars);
        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        for (i, set) in sets.iter_mut().enumerate() {
            set.rsi = match (avg_gain[i], avg_loss[i]) {
                (Some(gain), Some(loss)) => oscillator(gain, loss),
                _ => None,
            };
        }
    }
}
