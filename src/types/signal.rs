use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of crossover events that can raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    MacdBullishCrossover,
    MfiBullishCrossover,
    RsiOversoldRecovery,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::MacdBullishCrossover => "MACD_BULLISH_CROSSOVER",
            SignalKind::MfiBullishCrossover => "MFI_BULLISH_CROSSOVER",
            SignalKind::RsiOversoldRecovery => "RSI_OVERSOLD_RECOVERY",
        }
    }

    /// Human-readable title, e.g. "Macd Bullish Crossover".
    pub fn title(&self) -> &'static str {
        match self {
            SignalKind::MacdBullishCrossover => "Macd Bullish Crossover",
            SignalKind::MfiBullishCrossover => "Mfi Bullish Crossover",
            SignalKind::RsiOversoldRecovery => "Rsi Oversold Recovery",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MACD_BULLISH_CROSSOVER" => Ok(SignalKind::MacdBullishCrossover),
            "MFI_BULLISH_CROSSOVER" => Ok(SignalKind::MfiBullishCrossover),
            "RSI_OVERSOLD_RECOVERY" => Ok(SignalKind::RsiOversoldRecovery),
            _ => Err(format!("Unknown signal type: {}", s)),
        }
    }
}

/// A crossover detected on the most recent bar of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    /// Indicator value on the current bar.
    pub value: f64,
    /// Line or threshold the value crossed.
    pub reference: f64,
    /// Close of the current bar.
    pub price: f64,
    pub bar_timestamp: DateTime<FixedOffset>,
}

impl Signal {
    /// Identity of this event: symbol, kind and bar time.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.symbol,
            self.kind.as_str(),
            self.bar_timestamp.to_rfc3339()
        )
    }
}
