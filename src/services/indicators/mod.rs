//! Technical indicator implementations and the batch indicator engine.

pub mod ema;
pub mod macd;
pub mod mfi;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use macd::Macd;
pub use mfi::{FlowDirection, Mfi};
pub use rsi::Rsi;
pub use volume::VolumeProfile;

use crate::config::IndicatorConfig;
use crate::error::IndicatorError;
use crate::types::{Bar, IndicatorSet, Series};
use tracing::debug;

/// Trait for implementing technical indicators.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Number of bars needed before the first defined value.
    fn min_periods(&self) -> usize;

    /// Fill this indicator's columns of `sets`, which is index-aligned with
    /// `bars`. Cells that cannot be computed are left as `None`.
    fn apply(&self, bars: &[Bar], sets: &mut [IndicatorSet]);
}

/// `100 - 100 / (1 + up/down)`, the shared RSI/MFI form.
///
/// No movement at all (0/0) is undefined; only upward movement (x/0) is 100.
pub(crate) fn oscillator(up: f64, down: f64) -> Option<f64> {
    if down == 0.0 {
        if up == 0.0 {
            None
        } else {
            Some(100.0)
        }
    } else {
        Some(100.0 - 100.0 / (1.0 + up / down))
    }
}

/// Computes the full indicator set for a series in one batch.
pub struct IndicatorEngine {
    config: IndicatorConfig,
    indicators: Vec<Box<dyn Indicator>>,
}

impl IndicatorEngine {
    /// Create an engine, rejecting unusable windows.
    pub fn new(config: IndicatorConfig) -> Result<Self, IndicatorError> {
        let windows = [
            ("macd_fast", config.macd_fast),
            ("macd_slow", config.macd_slow),
            ("macd_signal", config.macd_signal),
            ("rsi_period", config.rsi_period),
            ("mfi_period", config.mfi_period),
            ("volume_ma_short", config.volume_ma_short),
            ("volume_ma_long", config.volume_ma_long),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(IndicatorError::InvalidConfig(format!("{} must be positive", name)));
        }
        if config.macd_fast >= config.macd_slow {
            return Err(IndicatorError::InvalidConfig(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                config.macd_fast, config.macd_slow
            )));
        }
        if !config.volume_surge_multiplier.is_finite() || !config.mfi_midline.is_finite() {
            return Err(IndicatorError::InvalidConfig(
                "thresholds must be finite".to_string(),
            ));
        }

        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Macd::new(config.macd_fast, config.macd_slow, config.macd_signal)),
            Box::new(Rsi::new(config.rsi_period)),
            Box::new(Mfi::new(config.mfi_period, config.mfi_midline)),
            Box::new(VolumeProfile::new(
                config.volume_ma_short,
                config.volume_ma_long,
                config.volume_surge_multiplier,
            )),
        ];

        Ok(Self { config, indicators })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Registered indicators, in evaluation order.
    pub fn indicators(&self) -> &[Box<dyn Indicator>] {
        &self.indicators
    }

    /// Compute one indicator set per bar.
    ///
    /// Fails only when a bar carries an absent or unusable price.
    pub fn compute(&self, series: &Series) -> Result<Vec<IndicatorSet>, IndicatorError> {
        let bars = series.bars();
        if let Some((index, column)) = bars
            .iter()
            .enumerate()
            .find_map(|(i, bar)| bar.invalid_column().map(|c| (i, c)))
        {
            return Err(IndicatorError::MissingColumn { column, index });
        }

        let mut sets = vec![IndicatorSet::default(); bars.len()];
        for indicator in &self.indicators {
            if bars.len() < indicator.min_periods() {
                debug!(
                    "{}: {} bars, {} needs {} - values stay undefined",
                    series.symbol(),
                    bars.len(),
                    indicator.name(),
                    indicator.min_periods()
                );
            }
            indicator.apply(bars, &mut sets);
        }

        Ok(sets)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        let config = IndicatorConfig::default();
        Self {
            indicators: vec![
                Box::new(Macd::default()),
                Box::new(Rsi::default()),
                Box::new(Mfi::default()),
                Box::new(VolumeProfile::default()),
            ],
            config,
        }
    }
}
