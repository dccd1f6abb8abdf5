//! Money Flow Index (MFI) indicator.

use super::sma::rolling_sum;
use super::{oscillator, Indicator};
use crate::types::{Bar, IndicatorSet};

/// Direction of a bar's money flow relative to the previous bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Positive,
    Negative,
    Neutral,
}

/// MFI (Money Flow Index) indicator.
///
/// Volume-weighted RSI. Measures buying and selling pressure:
/// MFI = 100 - (100 / (1 + Money Flow Ratio))
///
/// Also marks bullish crossovers of the midline (50 by default).
pub struct Mfi {
    period: usize,
    midline: f64,
}

impl Default for Mfi {
    fn default() -> Self {
        Self {
            period: 14,
            midline: 50.0,
        }
    }
}

impl Mfi {
    pub fn new(period: usize, midline: f64) -> Self {
        Self { period, midline }
    }

    /// Classify every bar against its predecessor. Bar 0 has no classification.
    pub fn classify_flows(bars: &[Bar]) -> Vec<Option<FlowDirection>> {
        if bars.is_empty() {
            return Vec::new();
        }
        std::iter::once(None)
            .chain(bars.windows(2).map(|pair| {
                let prev_tp = pair[0].typical_price();
                let current_tp = pair[1].typical_price();
                Some(if current_tp > prev_tp {
                    FlowDirection::Positive
                } else if current_tp < prev_tp {
                    FlowDirection::Negative
                } else {
                    FlowDirection::Neutral
                })
            }))
            .collect()
    }
}

impl Indicator for Mfi {
    fn id(&self) -> &str {
        "mfi"
    }

    fn name(&self) -> &str {
        "MFI"
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn apply(&self, bars: &[Bar], sets: &mut [IndicatorSet]) {
        let directions = Self::classify_flows(bars);

        let (positive, negative): (Vec<Option<f64>>, Vec<Option<f64>>) = bars
            .iter()
            .zip(directions.iter())
            .map(|(bar, direction)| {
                let money_flow = bar.typical_price() * bar.volume as f64;
                match direction {
                    Some(FlowDirection::Positive) => (Some(money_flow), Some(0.0)),
                    Some(FlowDirection::Negative) => (Some(0.0), Some(money_flow)),
                    Some(FlowDirection::Neutral) => (Some(0.0), Some(0.0)),
                    None => (None, None),
                }
            })
            .unzip();

        let positive_sum = rolling_sum(&positive, self.period);
        let negative_sum = rolling_sum(&negative, self.period);

        for (i, set) in sets.iter_mut().enumerate() {
            set.mfi = match (positive_sum[i], negative_sum[i]) {
                (Some(pos), Some(neg)) => oscillator(pos, neg),
                _ => None,
            };
        }

        for i in 1..sets.len() {
            sets[i].mfi_crossover = match (sets[i].mfi, sets[i - 1].mfi) {
                (Some(current), Some(previous)) => {
                    current > self.midline && previous <= self.midline
                }
                _ => false,
            };
        }
    }
}
