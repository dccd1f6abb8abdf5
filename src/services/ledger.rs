//! Deduplicated, persisted log of dispatched alerts.
//!
//! Every alert-worthy event is identified by its dedup key. The ledger makes
//! sure each key reaches the notifier at most once per successful dispatch:
//! a key is reserved before the notifier is awaited, and written to the
//! durable store only after the notifier accepted it.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::notifier::{alert_body, alert_subject, Notifier};
use super::sqlite_store::LedgerStore;
use crate::error::{NotificationError, StorageError};
use crate::types::{AlertRecord, AlertSummary, Signal};

#[derive(Default)]
struct LedgerState {
    /// Records in dispatch order.
    records: Vec<AlertRecord>,
    /// Keys of `records`.
    keys: HashSet<String>,
    /// Keys whose dispatch is currently awaiting the notifier.
    in_flight: HashSet<String>,
}

/// Shared alert ledger.
pub struct AlertLedger {
    store: Box<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<LedgerState>,
}

impl AlertLedger {
    /// Open the ledger, loading the key index from the store.
    pub fn open(
        store: Box<dyn LedgerStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, StorageError> {
        let mut records = store.load_all()?;
        records.sort_by_key(|r| r.sent_at);
        let keys = records.iter().map(|r| r.key.clone()).collect();

        info!(
            "Alert ledger opened with {} records, notifier: {}",
            records.len(),
            notifier.name()
        );

        Ok(Self {
            store,
            notifier,
            state: Mutex::new(LedgerState {
                records,
                keys,
                in_flight: HashSet::new(),
            }),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::InvalidRecord("ledger state poisoned".to_string()))
    }

    /// Dispatch `signal` unless its key was already recorded.
    ///
    /// Returns `Ok(true)` when the notifier accepted the alert and the record
    /// was persisted. A duplicate, a concurrent dispatch of the same key, or a
    /// notifier failure all return `Ok(false)`; a failed notification is not
    /// recorded, so the next scan retries it.
    pub async fn record_if_new(&self, signal: &Signal) -> Result<bool, StorageError> {
        let key = signal.dedup_key();

        {
            let mut state = self.state()?;
            if state.keys.contains(&key) || !state.in_flight.insert(key.clone()) {
                debug!("Skipping already dispatched alert {}", key);
                return Ok(false);
            }
        }

        let sent = self
            .notifier
            .send(&alert_subject(signal), &alert_body(signal))
            .await;

        let mut state = self.state()?;
        state.in_flight.remove(&key);

        if let Err(e) = sent {
            warn!("Failed to dispatch alert {} via {}: {}", key, self.notifier.name(), e);
            return Ok(false);
        }

        let record = AlertRecord::from_signal(signal, Utc::now());
        self.store.append(&record)?;
        state.keys.insert(key);
        state.records.push(record);

        info!("Dispatched {} for {}", signal.kind, signal.symbol);
        Ok(true)
    }

    /// Records sent within `window` before `now`, newest first.
    pub fn recent_alerts_at(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let since = now - window;
        let state = self.state()?;
        let mut recent: Vec<AlertRecord> = state
            .records
            .iter()
            .filter(|r| r.sent_at >= since && r.sent_at <= now)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(recent)
    }

    pub fn recent_alerts(&self, window: Duration) -> Result<Vec<AlertRecord>, StorageError> {
        self.recent_alerts_at(window, Utc::now())
    }

    /// Totals over the whole ledger. "Today" is the UTC date of `now`.
    pub fn summary_at(&self, now: DateTime<Utc>) -> Result<AlertSummary, StorageError> {
        let state = self.state()?;
        let today = now.date_naive();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &state.records {
            *counts.entry(record.symbol.as_str()).or_default() += 1;
        }
        let most_active_symbol = counts
            .into_iter()
            .max_by(|(sa, ca), (sb, cb)| ca.cmp(cb).then_with(|| sb.cmp(sa)))
            .map(|(symbol, _)| symbol.to_string());

        Ok(AlertSummary {
            total: state.records.len(),
            today: state
                .records
                .iter()
                .filter(|r| r.sent_at.date_naive() == today)
                .count(),
            most_active_symbol,
        })
    }

    pub fn summary(&self) -> Result<AlertSummary, StorageError> {
        self.summary_at(Utc::now())
    }

    /// Remove records sent more than `max_age` before `now`.
    pub fn prune_at(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff = now - max_age;
        let mut state = self.state()?;

        let expired: Vec<String> = state
            .records
            .iter()
            .filter(|r| r.sent_at < cutoff)
            .map(|r| r.key.clone())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        self.store.remove(&expired)?;
        state.records.retain(|r| r.sent_at >= cutoff);
        for key in &expired {
            state.keys.remove(key);
        }

        info!("Pruned {} alerts sent before {}", expired.len(), cutoff);
        Ok(expired.len())
    }

    pub fn prune(&self, max_age: Duration) -> Result<usize, StorageError> {
        self.prune_at(max_age, Utc::now())
    }

    /// Drop every record.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let mut state = self.state()?;
        let removed = self.store.clear()?;
        state.records.clear();
        state.keys.clear();
        info!("Cleared alert ledger ({} records)", removed);
        Ok(removed)
    }

    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.state()?.keys.contains(key))
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.state()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Send a fixed message through the notifier without touching the log.
    pub async fn send_test_notification(&self) -> Result<(), NotificationError> {
        self.notifier
            .send(
                "Stock Alert: test notification",
                "This is a test alert. Notification delivery is configured correctly.\n",
            )
            .await
    }
}
