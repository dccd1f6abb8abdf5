//! Turns per-bar indicator values into one-shot crossover signals.

use crate::config::DetectorConfig;
use crate::types::{Bar, IndicatorSet, Series, Signal, SignalKind};

/// Compares the two most recent indicator sets of a series.
///
/// Older bars are never evaluated, so a transition is reported only while it
/// is the newest one.
pub struct CrossoverDetector {
    config: DetectorConfig,
}

impl Default for CrossoverDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl CrossoverDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Signals for the transition from `prev` to `curr`, in MACD, MFI, RSI
    /// order.
    pub fn detect(
        &self,
        symbol: &str,
        prev: &IndicatorSet,
        curr: &IndicatorSet,
        bar: &Bar,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        let make = |kind: SignalKind, value: f64, reference: f64| Signal {
            symbol: symbol.to_string(),
            kind,
            value,
            reference,
            price: bar.close,
            bar_timestamp: bar.timestamp,
        };

        if curr.macd_crossover {
            if let (Some(macd), Some(signal)) = (curr.macd, curr.macd_signal) {
                signals.push(make(SignalKind::MacdBullishCrossover, macd, signal));
            }
        }

        if curr.mfi_crossover {
            if let Some(mfi) = curr.mfi {
                signals.push(make(SignalKind::MfiBullishCrossover, mfi, self.config.mfi_midline));
            }
        }

        if let (Some(rsi), Some(prev_rsi)) = (curr.rsi, prev.rsi) {
            let threshold = self.config.rsi_oversold;
            if rsi > threshold && prev_rsi <= threshold {
                signals.push(make(SignalKind::RsiOversoldRecovery, rsi, threshold));
            }
        }

        signals
    }

    /// Evaluate the last two bars of a series. Series shorter than two bars,
    /// or indicator sets not aligned with the series, yield no signals.
    pub fn detect_latest(&self, series: &Series, sets: &[IndicatorSet]) -> Vec<Signal> {
        let n = series.len();
        if n < 2 || sets.len() != n {
            return Vec::new();
        }
        self.detect(series.symbol(), &sets[n - 2], &sets[n - 1], &series.bars()[n - 1])
    }
}
