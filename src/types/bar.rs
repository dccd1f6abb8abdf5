use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// One OHLCV observation for a fixed time bucket.
///
/// The timestamp keeps the exchange's UTC offset so bucket alignment and
/// display stay in exchange-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Name of the first price column that is not a usable value, if any.
    ///
    /// NaN stands in for an absent value, so it is reported the same way as a
    /// missing column.
    pub fn invalid_column(&self) -> Option<&'static str> {
        if !self.open.is_finite() {
            Some("open")
        } else if !self.high.is_finite() {
            Some("high")
        } else if !self.low.is_finite() {
            Some("low")
        } else if !self.close.is_finite() || self.close <= 0.0 {
            Some("close")
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_column().is_none()
    }
}

/// Ordered bars for one symbol with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Create an empty series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    /// Build a series, rejecting any ordering violation.
    pub fn from_bars(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, MergeError> {
        check_order(&bars)?;
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Append a bar after the current last bar.
    pub fn push(&mut self, bar: Bar) -> Result<(), MergeError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(MergeError::InvalidTimestampOrder {
                    index: self.bars.len(),
                    previous: last.timestamp,
                    current: bar.timestamp,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    /// Keep only the newest `max` bars. Returns how many were dropped.
    pub fn retain_last(&mut self, max: usize) -> usize {
        let excess = self.bars.len().saturating_sub(max);
        if excess > 0 {
            self.bars.drain(..excess);
        }
        excess
    }
}

/// Verify timestamps are strictly increasing.
pub(crate) fn check_order(bars: &[Bar]) -> Result<(), MergeError> {
    for (index, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(MergeError::InvalidTimestampOrder {
                index: index + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(hour: u32, close: f64) -> Bar {
        let tz = FixedOffset::east_opt(19800).unwrap();
        let ts = tz.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 100)
    }

    #[test]
    fn test_typical_price() {
        let bar = bar_at(9, 10.0);
        assert!((bar.typical_price() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_column_detection() {
        let mut bar = bar_at(9, 10.0);
        assert!(bar.is_valid());

        bar.high = f64::NAN;
        assert_eq!(bar.invalid_column(), Some("high"));

        bar.high = 11.0;
        bar.close = 0.0;
        assert_eq!(bar.invalid_column(), Some("close"));
    }

    #[test]
    fn test_from_bars_rejects_duplicates() {
        let result = Series::from_bars("INFY", vec![bar_at(9, 1.0), bar_at(9, 2.0)]);
        assert!(matches!(
            result,
            Err(MergeError::InvalidTimestampOrder { index: 1, .. })
        ));
    }

    #[test]
    fn test_from_bars_rejects_descending() {
        let result = Series::from_bars("INFY", vec![bar_at(10, 1.0), bar_at(9, 2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_push_enforces_order() {
        let mut series = Series::new("INFY");
        series.push(bar_at(9, 1.0)).unwrap();
        series.push(bar_at(13, 1.0)).unwrap();
        assert!(series.push(bar_at(13, 2.0)).is_err());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_retain_last_drops_oldest() {
        let mut series =
            Series::from_bars("INFY", vec![bar_at(1, 1.0), bar_at(5, 2.0), bar_at(9, 3.0)]).unwrap();
        assert_eq!(series.retain_last(2), 1);
        assert_eq!(series.bars()[0].close, 2.0);
        assert_eq!(series.retain_last(10), 0);
    }
}
