use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Signal, SignalKind};

/// A dispatched alert as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Dedup key, unique across the ledger.
    pub key: String,
    pub symbol: String,
    pub signal_type: SignalKind,
    /// Time of the bar that produced the signal.
    pub timestamp: DateTime<FixedOffset>,
    /// Time the notifier accepted the alert.
    pub sent_at: DateTime<Utc>,
    pub price: f64,
    pub signal_value: f64,
}

impl AlertRecord {
    pub fn from_signal(signal: &Signal, sent_at: DateTime<Utc>) -> Self {
        Self {
            key: signal.dedup_key(),
            symbol: signal.symbol.clone(),
            signal_type: signal.kind,
            timestamp: signal.bar_timestamp,
            sent_at,
            price: signal.price,
            signal_value: signal.value,
        }
    }
}

/// Aggregate view over the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total: usize,
    pub today: usize,
    pub most_active_symbol: Option<String>,
}
