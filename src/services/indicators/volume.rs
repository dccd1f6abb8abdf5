//! Volume moving averages and surge detection.

use super::sma::rolling_mean;
use super::Indicator;
use crate::types::{Bar, IndicatorSet};

/// Short and long volume SMAs plus a surge flag.
///
/// A bar surges when its volume exceeds the short average times the
/// multiplier (1.5 by default).
pub struct VolumeProfile {
    short_period: usize,
    long_period: usize,
    surge_multiplier: f64,
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self {
            short_period: 20,
            long_period: 50,
            surge_multiplier: 1.5,
        }
    }
}

impl VolumeProfile {
    pub fn new(short_period: usize, long_period: usize, surge_multiplier: f64) -> Self {
        Self {
            short_period,
            long_period,
            surge_multiplier,
        }
    }
}

impl Indicator for VolumeProfile {
    fn id(&self) -> &str {
        "volume"
    }

    fn name(&self) -> &str {
        "Volume MA"
    }

    fn min_periods(&self) -> usize {
        self.short_period
    }

    fn apply(&self, bars: &[Bar], sets: &mut [IndicatorSet]) {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        let short_ma = rolling_mean(&volumes, self.short_period);
        let long_ma = rolling_mean(&volumes, self.long_period);

        for (i, set) in sets.iter_mut().enumerate() {
            set.volume_ma_short = short_ma[i];
            set.volume_ma_long = long_ma[i];
            set.volume_surge = short_ma[i]
                .map(|ma| volumes[i] > ma * self.surge_multiplier)
                .unwrap_or(false);
        }
    }
}
