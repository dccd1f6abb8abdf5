//! End-to-end scan tests with in-process market data and notifier doubles.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use crosswatch::config::ScanConfig;
use crosswatch::error::{NotificationError, SourceError};
use crosswatch::services::{
    AlertLedger, CrossoverDetector, FileSeriesStore, IndicatorEngine, Notifier, Scanner,
    SeriesStore, SqliteLedgerStore,
};
use crosswatch::sources::BarSource;
use crosswatch::types::{Bar, SignalKind};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn day0() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(19800)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .unwrap()
}

/// Hourly bars for 30 four-hour buckets: a steady decline followed by a
/// sharp bounce in the last bucket.
fn bounce_bars() -> Vec<Bar> {
    let mut bars = Vec::new();
    for k in 0..30i64 {
        let close = if k < 29 { 100.0 - k as f64 } else { 82.0 };
        for h in 0..4i64 {
            let ts = day0() + ChronoDuration::hours(4 * k + h);
            bars.push(Bar::new(ts, close, close + 0.5, close - 0.5, close, 1_000));
        }
    }
    bars
}

/// `hours` after the first bucket opened.
fn at(hours: i64) -> DateTime<Utc> {
    (day0() + ChronoDuration::hours(hours)).with_timezone(&Utc)
}

fn key(kind: SignalKind, bar_hours: i64) -> String {
    format!(
        "TCS.NS_{}_{}",
        kind.as_str(),
        (day0() + ChronoDuration::hours(bar_hours)).to_rfc3339()
    )
}

struct FixedSource {
    bars: Vec<Bar>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FixedSource {
    fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl BarSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(
        &self,
        symbol: &str,
        _lookback: Duration,
        _granularity: Duration,
    ) -> Result<Vec<Bar>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if symbol.starts_with("BAD") {
            return Err(SourceError::Status("404 Not Found".to_string()));
        }
        Ok(self.bars.clone())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    subjects: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, subject: &str, _body: &str) -> Result<(), NotificationError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("connection refused".to_string()));
        }
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

struct Harness {
    scanner: Arc<Scanner>,
    source: Arc<FixedSource>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<FileSeriesStore>,
    ledger: Arc<AlertLedger>,
}

fn harness(dir: &Path, symbols: &[&str], source: FixedSource) -> Harness {
    let source = Arc::new(source);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(FileSeriesStore::new(dir.join("series")).unwrap());
    let ledger = Arc::new(
        AlertLedger::open(
            Box::new(SqliteLedgerStore::new(dir.join("alerts.db")).unwrap()),
            notifier.clone(),
        )
        .unwrap(),
    );

    let config = ScanConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        request_delay: Duration::ZERO,
        ..Default::default()
    };
    let scanner = Scanner::new(
        config,
        source.clone(),
        store.clone(),
        Arc::new(IndicatorEngine::default()),
        CrossoverDetector::default(),
        ledger.clone(),
    )
    .unwrap();

    Harness {
        scanner: Arc::new(scanner),
        source,
        notifier,
        store,
        ledger,
    }
}

#[tokio::test]
async fn test_first_scan_builds_series_and_dispatches() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    let report = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert!(report.fetched);
    assert_eq!(report.bars, 30);
    assert!(report.dispatched >= 1);
    assert_eq!(report.dispatched, report.signals);

    let stored = h.store.load("TCS.NS").unwrap().unwrap();
    assert_eq!(stored.len(), 30);
    assert_eq!(stored.last().unwrap().close, 82.0);

    let rsi_key = format!(
        "TCS.NS_{}_{}",
        SignalKind::RsiOversoldRecovery.as_str(),
        (day0() + ChronoDuration::hours(116)).to_rfc3339()
    );
    assert!(h.ledger.contains(&rsi_key).unwrap());
    assert!(h
        .notifier
        .sent()
        .contains(&"Stock Alert: TCS.NS - Rsi Oversold Recovery".to_string()));
}

#[tokio::test]
async fn test_unchanged_latest_bar_dispatches_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    let first = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    let sent_after_first = h.notifier.sent().len();

    let second = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert!(second.fetched);
    assert_eq!(second.signals, first.signals);
    assert_eq!(second.dispatched, 0);
    assert_eq!(h.notifier.sent().len(), sent_after_first);
    assert_eq!(h.ledger.len().unwrap(), first.dispatched);
}

#[tokio::test]
async fn test_fresh_series_skips_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);

    let report = h.scanner.scan_symbol("TCS.NS", at(117)).await.unwrap();
    assert!(!report.fetched);
    assert_eq!(report.bars, 30);
    assert_eq!(report.dispatched, 0);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dedup_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first_sent = {
        let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));
        h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
        h.notifier.sent().len()
    };
    assert!(first_sent >= 1);

    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));
    assert_eq!(h.ledger.len().unwrap(), first_sent);
    let report = h.scanner.scan_symbol("TCS.NS", at(125)).await.unwrap();
    assert_eq!(report.dispatched, 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_scan_all_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        dir.path(),
        &["TCS.NS", "BAD.NS", "INFY.NS"],
        FixedSource::new(bounce_bars()),
    );

    let report = h.scanner.scan_all(at(121)).await.unwrap();
    assert_eq!(report.symbols, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(report.dispatched >= 2);

    let status = h.scanner.status(at(121));
    let bad = status.iter().find(|s| s.symbol == "BAD.NS").unwrap();
    assert_eq!(bad.bars, 0);
    assert!(bad.last_error.as_deref().unwrap().contains("404"));
    let good = status.iter().find(|s| s.symbol == "INFY.NS").unwrap();
    assert_eq!(good.bars, 30);
    assert!(good.last_error.is_none());
}

#[tokio::test]
async fn test_overlapping_scan_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FixedSource::new(bounce_bars());
    source.delay = Duration::from_millis(300);
    let h = harness(dir.path(), &["TCS.NS"], source);

    let scanner = h.scanner.clone();
    let running = tokio::spawn(async move { scanner.scan_all(at(121)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.scanner.is_scanning());
    assert!(h.scanner.scan_all(at(121)).await.is_none());

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(!h.scanner.is_scanning());
}

#[tokio::test]
async fn test_bucket_with_forming_last_sub_bar_is_not_alerted() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    // The source already reports the 119h bar, which trades until 120h
    let forming = at(119) + ChronoDuration::minutes(20);
    let report = h.scanner.scan_symbol("TCS.NS", forming).await.unwrap();
    assert_eq!(report.bars, 29);

    let stored = h.store.load("TCS.NS").unwrap().unwrap();
    assert_eq!(stored.last().unwrap().timestamp, day0() + ChronoDuration::hours(112));
    for kind in [
        SignalKind::MacdBullishCrossover,
        SignalKind::MfiBullishCrossover,
        SignalKind::RsiOversoldRecovery,
    ] {
        assert!(!h.ledger.contains(&key(kind, 116)).unwrap());
    }

    // Once the bucket has closed it is stored and alerted on
    let report = h.scanner.scan_symbol("TCS.NS", at(120)).await.unwrap();
    assert_eq!(report.bars, 30);
    assert!(h.ledger.contains(&key(SignalKind::RsiOversoldRecovery, 116)).unwrap());
}

#[tokio::test]
async fn test_pruned_alert_on_unchanged_bar_is_not_resent() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    let first = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert!(first.dispatched >= 1);

    let pruned = h
        .ledger
        .prune_at(ChronoDuration::days(7), Utc::now() + ChronoDuration::days(8))
        .unwrap();
    assert_eq!(pruned, first.dispatched);

    // The listing stopped trading: the same bars come back a week later
    let later = at(121) + ChronoDuration::days(8);
    let second = h.scanner.scan_symbol("TCS.NS", later).await.unwrap();
    assert!(second.fetched);
    assert_eq!(second.bars, 30);
    assert_eq!(second.dispatched, 0);
    assert_eq!(h.notifier.sent().len(), first.dispatched);
}

#[tokio::test]
async fn test_failed_notification_is_retried_by_next_scan() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));
    h.notifier.offline.store(true, Ordering::SeqCst);

    let first = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert!(first.signals >= 1);
    assert_eq!(first.dispatched, 0);
    assert!(h.ledger.is_empty().unwrap());

    h.notifier.offline.store(false, Ordering::SeqCst);

    // A fresh series skips the fetch but still retries the alert
    let second = h.scanner.scan_symbol("TCS.NS", at(117)).await.unwrap();
    assert!(!second.fetched);
    assert_eq!(second.dispatched, first.signals);
    assert_eq!(h.ledger.len().unwrap(), first.signals);

    let third = h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    assert_eq!(third.dispatched, 0);
    assert_eq!(h.notifier.sent().len(), first.signals);
}

#[tokio::test]
async fn test_refresh_ignores_freshness_gate() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), &["TCS.NS"], FixedSource::new(bounce_bars()));

    h.scanner.scan_symbol("TCS.NS", at(121)).await.unwrap();
    let refreshed = h.scanner.refresh_symbol("TCS.NS", at(121)).await.unwrap();

    assert!(refreshed.fetched);
    assert_eq!(refreshed.bars, 30);
    assert_eq!(refreshed.dispatched, 0);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 2);

    let status = h.scanner.status(at(121));
    assert_eq!(status[0].last_scan, Some(at(121)));
    assert!(status[0].last_error.is_none());
}
