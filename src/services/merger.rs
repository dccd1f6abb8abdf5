//! Aggregates raw sub-period bars and merges them into stored series.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MergeError;
use crate::types::{Bar, Series};

const SECONDS_PER_DAY: u64 = 86_400;

/// How current a stored series is relative to the canonical period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Latest bar is younger than one period; a fetch would find nothing new.
    Fresh,
    /// Latest bar is younger than a day.
    Recent,
    Stale,
    /// No bars stored.
    Empty,
}

impl Freshness {
    /// Classify a series at `now`.
    pub fn of(series: &Series, period: Duration, now: DateTime<Utc>) -> Self {
        let Some(last) = series.last() else {
            return Freshness::Empty;
        };
        let age = (now - last.timestamp.with_timezone(&Utc)).num_seconds();
        if age < period.as_secs() as i64 {
            Freshness::Fresh
        } else if age < SECONDS_PER_DAY as i64 {
            Freshness::Recent
        } else {
            Freshness::Stale
        }
    }

    /// Whether a fetch-and-merge cycle should run.
    pub fn needs_update(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Builds canonical-period bars from raw bars and merges them into a series.
#[derive(Debug, Clone)]
pub struct SeriesMerger {
    period: Duration,
    granularity: Duration,
    max_history: Option<usize>,
}

impl SeriesMerger {
    /// `period` must be a whole number of seconds dividing one day, and
    /// `granularity` must be a positive width no larger than `period`.
    pub fn new(period: Duration, granularity: Duration) -> Result<Self, MergeError> {
        let period_secs = period.as_secs();
        if period_secs == 0 || period.subsec_nanos() != 0 || SECONDS_PER_DAY % period_secs != 0 {
            return Err(MergeError::InvalidPeriod(format!(
                "{}s does not divide a day",
                period_secs
            )));
        }
        if granularity.is_zero() || granularity > period {
            return Err(MergeError::InvalidPeriod(format!(
                "granularity {}s must be positive and at most the period",
                granularity.as_secs()
            )));
        }
        Ok(Self {
            period,
            granularity,
            max_history: None,
        })
    }

    /// Keep at most `max` bars after each merge, dropping the oldest.
    pub fn with_history_cap(mut self, max: usize) -> Self {
        self.max_history = Some(max);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Start of the period bucket containing `ts`, aligned to exchange-local
    /// midnight.
    pub fn bucket_start(&self, ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let since_midnight = i64::from(ts.naive_local().num_seconds_from_midnight());
        let into_bucket = since_midnight % self.period.as_secs() as i64;
        ts - chrono::Duration::seconds(into_bucket)
            - chrono::Duration::nanoseconds(i64::from(ts.nanosecond()))
    }

    /// Aggregate raw bars into complete period buckets.
    ///
    /// The fetched window runs from the first raw bar to the end of the last
    /// one. Buckets that the window does not cover entirely (typically the
    /// still-forming last bucket and a leading bucket cut by the lookback)
    /// are dropped.
    pub fn aggregate(&self, raw: &[Bar]) -> Vec<Bar> {
        self.aggregate_closed(raw, None)
    }

    /// Like [`aggregate`](Self::aggregate), but raw bars still open at `now`
    /// (`timestamp + granularity > now`) are ignored, so a bucket whose last
    /// sub-bar is forming never counts as complete.
    pub fn aggregate_until(&self, raw: &[Bar], now: DateTime<Utc>) -> Vec<Bar> {
        self.aggregate_closed(raw, Some(now))
    }

    fn aggregate_closed(&self, raw: &[Bar], now: Option<DateTime<Utc>>) -> Vec<Bar> {
        let granularity = chrono::Duration::seconds(self.granularity.as_secs() as i64);
        let mut sorted: Vec<&Bar> = raw
            .iter()
            .filter(|bar| {
                if !bar.is_valid() {
                    warn!("Dropping invalid raw bar at {}", bar.timestamp);
                    return false;
                }
                match now {
                    Some(now) if bar.timestamp + granularity > now => {
                        debug!("Ignoring raw bar at {} still open at {}", bar.timestamp, now);
                        false
                    }
                    _ => true,
                }
            })
            .collect();
        sorted.sort_by_key(|bar| bar.timestamp);

        // Duplicate raw timestamps keep the last bar fetched
        let mut unique: Vec<&Bar> = Vec::with_capacity(sorted.len());
        for bar in sorted {
            match unique.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => unique.push(bar),
            }
        }

        let (Some(first), Some(last)) = (unique.first(), unique.last()) else {
            return Vec::new();
        };
        let period = chrono::Duration::seconds(self.period.as_secs() as i64);
        let window_start = first.timestamp;
        let window_end = last.timestamp + granularity;

        let mut buckets: BTreeMap<DateTime<FixedOffset>, Bar> = BTreeMap::new();
        for bar in unique {
            let start = self.bucket_start(bar.timestamp);
            buckets
                .entry(start)
                .and_modify(|bucket| {
                    bucket.high = bucket.high.max(bar.high);
                    bucket.low = bucket.low.min(bar.low);
                    bucket.close = bar.close;
                    bucket.volume = bucket.volume.saturating_add(bar.volume);
                })
                .or_insert_with(|| Bar::new(start, bar.open, bar.high, bar.low, bar.close, bar.volume));
        }

        let total = buckets.len();
        let complete: Vec<Bar> = buckets
            .into_values()
            .filter(|bucket| window_start <= bucket.timestamp && bucket.timestamp + period <= window_end)
            .collect();

        if complete.len() < total {
            debug!(
                "Dropped {} partially covered bucket(s) of {}",
                total - complete.len(),
                total
            );
        }
        complete
    }

    /// Merge already-aggregated bars into `existing`. Incoming bars replace
    /// stored bars with the same timestamp.
    pub fn merge_bars(&self, existing: &Series, incoming: Vec<Bar>) -> Result<Series, MergeError> {
        let mut by_time: BTreeMap<DateTime<FixedOffset>, Bar> = existing
            .bars()
            .iter()
            .map(|bar| (bar.timestamp, bar.clone()))
            .collect();
        for bar in incoming {
            by_time.insert(bar.timestamp, bar);
        }

        let mut merged = Series::from_bars(existing.symbol(), by_time.into_values().collect())?;
        if let Some(max) = self.max_history {
            let dropped = merged.retain_last(max);
            if dropped > 0 {
                debug!("{}: trimmed {} bars beyond history cap", existing.symbol(), dropped);
            }
        }
        Ok(merged)
    }

    /// Aggregate `raw` and merge the complete buckets into `existing`.
    ///
    /// On error `existing` is unchanged and the caller keeps using it.
    pub fn merge(&self, existing: &Series, raw: &[Bar]) -> Result<Series, MergeError> {
        self.merge_buckets(existing, raw, self.aggregate(raw))
    }

    /// Merge only the buckets that are complete at `now`.
    pub fn merge_until(
        &self,
        existing: &Series,
        raw: &[Bar],
        now: DateTime<Utc>,
    ) -> Result<Series, MergeError> {
        self.merge_buckets(existing, raw, self.aggregate_until(raw, now))
    }

    fn merge_buckets(
        &self,
        existing: &Series,
        raw: &[Bar],
        buckets: Vec<Bar>,
    ) -> Result<Series, MergeError> {
        debug!(
            "{}: merging {} buckets from {} raw bars into {} stored",
            existing.symbol(),
            buckets.len(),
            raw.len(),
            existing.len()
        );
        self.merge_bars(existing, buckets)
    }
}
