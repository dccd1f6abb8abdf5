//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::weighted_ema;
use super::Indicator;
use crate::types::{Bar, IndicatorSet};

/// MACD indicator.
///
/// Shows the relationship between two EMAs of close:
/// - MACD Line = EMA(fast) - EMA(slow)
/// - Signal Line = EMA(signal) of MACD Line
/// - Histogram = MACD Line - Signal Line
///
/// Uses the weighted-average EMA, so every value is defined from the first
/// bar. Also marks bullish crossovers: the bar where MACD moves above the
/// signal line after being at or below it.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
        }
    }
}

impl Indicator for Macd {
    fn id(&self) -> &str {
        "macd"
    }

    fn name(&self) -> &str {
        "MACD"
    }

    fn min_periods(&self) -> usize {
        1
    }

    fn apply(&self, bars: &[Bar], sets: &mut [IndicatorSet]) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let fast_ema = weighted_ema(&closes, self.fast_period);
        let slow_ema = weighted_ema(&closes, self.slow_period);

        let macd_line: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal_line = weighted_ema(&macd_line, self.signal_period);

        for (i, set) in sets.iter_mut().enumerate() {
            let macd = macd_line[i];
            let signal = signal_line[i];
            set.macd = Some(macd);
            set.macd_signal = Some(signal);
            set.macd_histogram = Some(macd - signal);
        }

        for i in 1..sets.len() {
            let crossed = match (
                sets[i].macd,
                sets[i].macd_signal,
                sets[i - 1].macd,
                sets[i - 1].macd_signal,
            ) {
                (Some(macd), Some(signal), Some(prev_macd), Some(prev_signal)) => {
                    macd > signal && prev_macd <= prev_signal
                }
                _ => false,
            };
            sets[i].macd_crossover = crossed;
        }
    }
}
