use serde::{Deserialize, Serialize};

use super::bar::Series;

/// RSI above this is overbought.
pub const RSI_OVERBOUGHT: f64 = 70.0;
/// RSI below this is oversold.
pub const RSI_OVERSOLD: f64 = 30.0;
/// MFI above this is overbought.
pub const MFI_OVERBOUGHT: f64 = 80.0;
/// MFI below this is oversold.
pub const MFI_OVERSOLD: f64 = 20.0;

/// Indicator values for one bar, index-aligned with its series.
///
/// `None` marks a value that is undefined at this bar (warm-up not met, or
/// a 0/0 ratio). It is never the same thing as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi: Option<f64>,
    pub mfi: Option<f64>,
    pub volume_ma_short: Option<f64>,
    pub volume_ma_long: Option<f64>,
    pub volume_surge: bool,
    pub macd_crossover: bool,
    pub mfi_crossover: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub current: f64,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdSummary {
    pub value: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
    pub bullish: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsiSummary {
    pub value: Option<f64>,
    pub overbought: Option<bool>,
    pub oversold: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfiSummary {
    pub value: Option<f64>,
    pub overbought: Option<bool>,
    pub oversold: Option<bool>,
    pub bullish: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSummary {
    pub current: u64,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub surge: bool,
}

/// Latest-bar snapshot of every indicator.
///
/// Status flags stay undefined when the value they derive from is undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSummary {
    pub symbol: String,
    pub timestamp: String,
    pub price: PriceSummary,
    pub macd: MacdSummary,
    pub rsi: RsiSummary,
    pub mfi: MfiSummary,
    pub volume: VolumeSummary,
}

impl IndicatorSummary {
    /// Summarize the last bar. Returns `None` for an empty series or when the
    /// indicator sets are not aligned with the series.
    pub fn from_latest(series: &Series, sets: &[IndicatorSet], mfi_midline: f64) -> Option<Self> {
        if sets.len() != series.len() {
            return None;
        }
        let bars = series.bars();
        let latest = bars.last()?;
        let set = sets.last()?;

        let previous_close = bars.len().checked_sub(2).map(|i| bars[i].close);
        let change = previous_close.map(|prev| latest.close - prev);
        let change_pct = previous_close.map(|prev| (latest.close - prev) / prev * 100.0);

        let macd_bullish = match (set.macd, set.macd_signal) {
            (Some(macd), Some(signal)) => Some(macd > signal),
            _ => None,
        };

        Some(Self {
            symbol: series.symbol().to_string(),
            timestamp: latest.timestamp.to_rfc3339(),
            price: PriceSummary {
                current: latest.close,
                change,
                change_pct,
            },
            macd: MacdSummary {
                value: set.macd,
                signal: set.macd_signal,
                histogram: set.macd_histogram,
                bullish: macd_bullish,
            },
            rsi: RsiSummary {
                value: set.rsi,
                overbought: set.rsi.map(|v| v > RSI_OVERBOUGHT),
                oversold: set.rsi.map(|v| v < RSI_OVERSOLD),
            },
            mfi: MfiSummary {
                value: set.mfi,
                overbought: set.mfi.map(|v| v > MFI_OVERBOUGHT),
                oversold: set.mfi.map(|v| v < MFI_OVERSOLD),
                bullish: set.mfi.map(|v| v > mfi_midline),
            },
            volume: VolumeSummary {
                current: latest.volume,
                ma_short: set.volume_ma_short,
                ma_long: set.volume_ma_long,
                surge: set.volume_surge,
            },
        })
    }
}
