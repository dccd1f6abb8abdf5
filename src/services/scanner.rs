//! Per-symbol scan pipeline and the batch scan over all configured symbols.

use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::crossover::CrossoverDetector;
use super::indicators::IndicatorEngine;
use super::ledger::AlertLedger;
use super::merger::{Freshness, SeriesMerger};
use super::series_store::SeriesStore;
use crate::config::ScanConfig;
use crate::error::{MergeError, ScanError};
use crate::sources::BarSource;
use crate::types::Series;

/// Outcome of one symbol's scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolReport {
    pub symbol: String,
    /// Whether new data was fetched, as opposed to skipped by the freshness gate.
    pub fetched: bool,
    /// Bars in the series after the scan.
    pub bars: usize,
    /// Signals detected on the latest bar.
    pub signals: usize,
    /// Signals that were new and accepted by the notifier.
    pub dispatched: usize,
}

/// Totals of one batch scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub symbols: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub signals: usize,
    pub dispatched: usize,
}

#[derive(Debug, Clone)]
struct LastScan {
    at: DateTime<Utc>,
    error: Option<String>,
}

/// Data status of one configured symbol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolStatus {
    pub symbol: String,
    pub freshness: Freshness,
    pub bars: usize,
    pub last_bar: Option<DateTime<FixedOffset>>,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Clears the in-progress flag when a batch scan ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs load, fetch, merge, compute, detect and dispatch for each symbol.
pub struct Scanner {
    config: ScanConfig,
    source: Arc<dyn BarSource>,
    store: Arc<dyn SeriesStore>,
    engine: Arc<IndicatorEngine>,
    detector: CrossoverDetector,
    merger: SeriesMerger,
    ledger: Arc<AlertLedger>,
    last_fetch: Mutex<Option<Instant>>,
    scanning: AtomicBool,
    last_scans: DashMap<String, LastScan>,
}

impl Scanner {
    pub fn new(
        config: ScanConfig,
        source: Arc<dyn BarSource>,
        store: Arc<dyn SeriesStore>,
        engine: Arc<IndicatorEngine>,
        detector: CrossoverDetector,
        ledger: Arc<AlertLedger>,
    ) -> Result<Self, MergeError> {
        let mut merger = SeriesMerger::new(config.period, config.granularity)?;
        if config.max_history_bars > 0 {
            merger = merger.with_history_cap(config.max_history_bars);
        }

        Ok(Self {
            config,
            source,
            store,
            engine,
            detector,
            merger,
            ledger,
            last_fetch: Mutex::new(None),
            scanning: AtomicBool::new(false),
            last_scans: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Wait until at least `request_delay` has passed since the previous
    /// fetch started, across all workers.
    async fn throttle(&self) {
        let mut last = self.last_fetch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.request_delay {
                tokio::time::sleep(self.config.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// How far back to fetch for a series at `now`. An empty series gets the
    /// full initial history; otherwise the gap since the last bar is covered,
    /// but never less than the update lookback.
    fn lookback_for(&self, series: &Series, now: DateTime<Utc>) -> Duration {
        let Some(last) = series.last() else {
            return self.config.initial_lookback;
        };
        let gap = (now - last.timestamp.with_timezone(&Utc))
            .to_std()
            .unwrap_or_default();
        (gap + self.config.period)
            .max(self.config.update_lookback)
            .min(self.config.initial_lookback)
    }

    /// Run the full pipeline for one symbol.
    pub async fn scan_symbol(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<SymbolReport, ScanError> {
        self.run_symbol(symbol, now, false).await
    }

    /// Re-download the full initial history for one symbol, ignoring the
    /// freshness gate, then detect and dispatch as a normal scan does.
    pub async fn refresh_symbol(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<SymbolReport, ScanError> {
        info!("{}: forced refresh", symbol);
        let result = self.run_symbol(symbol, now, true).await;
        self.record_scan(symbol.to_string(), now, &result);
        result
    }

    async fn run_symbol(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<SymbolReport, ScanError> {
        let existing = self
            .store
            .load(symbol)?
            .unwrap_or_else(|| Series::new(symbol));
        let freshness = Freshness::of(&existing, self.config.period, now);

        let (series, fetched) = if force || freshness.needs_update() {
            let lookback = if force {
                self.config.initial_lookback
            } else {
                self.lookback_for(&existing, now)
            };
            self.throttle().await;
            let raw = self
                .source
                .fetch(symbol, lookback, self.config.granularity)
                .await?;

            let merged = self.merger.merge_until(&existing, &raw, now)?;
            if merged != existing {
                self.store.save(&merged)?;
            }
            debug!(
                "{}: fetched {} raw bars from {}, series now {} bars",
                symbol,
                raw.len(),
                self.source.name(),
                merged.len()
            );
            (merged, true)
        } else {
            debug!("{}: latest bar is fresh, skipping fetch", symbol);
            (existing, false)
        };

        let mut report = SymbolReport {
            symbol: symbol.to_string(),
            fetched,
            bars: series.len(),
            signals: 0,
            dispatched: 0,
        };

        // Ledger records of a bar this old may already be pruned
        if let Some(last) = series.last() {
            let age = (now - last.timestamp.with_timezone(&Utc))
                .to_std()
                .unwrap_or_default();
            if age > self.config.alert_retention {
                debug!(
                    "{}: latest bar {} is past alert retention, not alerting",
                    symbol, last.timestamp
                );
                return Ok(report);
            }
        }

        let sets = self.engine.compute(&series)?;
        let signals = self.detector.detect_latest(&series, &sets);
        report.signals = signals.len();

        for signal in &signals {
            if self.ledger.record_if_new(signal).await? {
                report.dispatched += 1;
            }
        }

        Ok(report)
    }

    fn record_scan(
        &self,
        symbol: String,
        now: DateTime<Utc>,
        result: &Result<SymbolReport, ScanError>,
    ) {
        let error = result.as_ref().err().map(|e| e.to_string());
        self.last_scans.insert(symbol, LastScan { at: now, error });
    }

    /// Scan every configured symbol with bounded parallelism.
    ///
    /// Returns `None` without doing anything when another batch scan is still
    /// running.
    pub async fn scan_all(&self, now: DateTime<Utc>) -> Option<ScanReport> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            warn!("Scan already in progress, skipping");
            return None;
        }
        let _guard = ScanGuard(&self.scanning);

        info!("Scanning {} symbols", self.config.symbols.len());

        let results: Vec<(String, Result<SymbolReport, ScanError>)> =
            stream::iter(self.config.symbols.iter().cloned())
                .map(|symbol| async move {
                    let result = self.scan_symbol(&symbol, now).await;
                    (symbol, result)
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut report = ScanReport {
            symbols: results.len(),
            ..Default::default()
        };
        for (symbol, result) in results {
            match &result {
                Ok(symbol_report) => {
                    report.succeeded += 1;
                    report.signals += symbol_report.signals;
                    report.dispatched += symbol_report.dispatched;
                }
                Err(e) => {
                    error!("Scan failed for {}: {}", symbol, e);
                    report.failed += 1;
                }
            }
            self.record_scan(symbol, now, &result);
        }

        info!(
            "Scan complete: {}/{} ok, {} signals, {} dispatched",
            report.succeeded, report.symbols, report.signals, report.dispatched
        );
        Some(report)
    }

    /// Data status for every configured symbol at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> Vec<SymbolStatus> {
        self.config
            .symbols
            .iter()
            .map(|symbol| {
                let series = match self.store.load(symbol) {
                    Ok(series) => series.unwrap_or_else(|| Series::new(symbol.as_str())),
                    Err(e) => {
                        warn!("Failed to load {} for status: {}", symbol, e);
                        Series::new(symbol.as_str())
                    }
                };
                let last_scan = self.last_scans.get(symbol).map(|s| s.value().clone());

                SymbolStatus {
                    symbol: symbol.clone(),
                    freshness: Freshness::of(&series, self.config.period, now),
                    bars: series.len(),
                    last_bar: series.last().map(|b| b.timestamp),
                    last_scan: last_scan.as_ref().map(|s| s.at),
                    last_error: last_scan.and_then(|s| s.error),
                }
            })
            .collect()
    }
}
