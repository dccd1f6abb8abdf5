//! File-based persistence for per-symbol bar series.
//!
//! Each symbol lives in its own `{SYMBOL}.json` file under the data
//! directory. Writes go to a temporary sibling file that is then renamed
//! over the target, so a crash never leaves a half-written series behind.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::types::{Bar, Series};

/// Load/save access to stored series.
pub trait SeriesStore: Send + Sync {
    /// The stored series for `symbol`, or `None` when nothing is stored yet.
    fn load(&self, symbol: &str) -> Result<Option<Series>, StorageError>;

    /// Replace the stored series for `series.symbol()`.
    fn save(&self, series: &Series) -> Result<(), StorageError>;
}

/// On-disk shape of a bar. Every column is optional so a truncated or
/// hand-edited file reports which column is missing.
#[derive(Debug, Serialize, Deserialize)]
struct StoredBar {
    timestamp: Option<DateTime<FixedOffset>>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

impl From<&Bar> for StoredBar {
    fn from(bar: &Bar) -> Self {
        Self {
            timestamp: Some(bar.timestamp),
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            volume: Some(bar.volume),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSeries {
    symbol: String,
    bars: Vec<StoredBar>,
}

fn into_bar(symbol: &str, index: usize, stored: StoredBar) -> Result<Bar, StorageError> {
    let missing = |column: &'static str| StorageError::MissingColumn {
        symbol: symbol.to_string(),
        column,
        index,
    };

    let bar = Bar::new(
        stored.timestamp.ok_or_else(|| missing("timestamp"))?,
        stored.open.ok_or_else(|| missing("open"))?,
        stored.high.ok_or_else(|| missing("high"))?,
        stored.low.ok_or_else(|| missing("low"))?,
        stored.close.ok_or_else(|| missing("close"))?,
        stored.volume.ok_or_else(|| missing("volume"))?,
    );
    match bar.invalid_column() {
        Some(column) => Err(missing(column)),
        None => Ok(bar),
    }
}

/// JSON-file series store.
pub struct FileSeriesStore {
    data_dir: PathBuf,
}

impl FileSeriesStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file holding `symbol`.
    fn path_for(&self, symbol: &str) -> PathBuf {
        let safe = symbol.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.data_dir.join(format!("{}.json", safe))
    }
}

impl SeriesStore for FileSeriesStore {
    fn load(&self, symbol: &str) -> Result<Option<Series>, StorageError> {
        let path = self.path_for(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSeries = serde_json::from_str(&content)?;
        if stored.symbol != symbol {
            warn!(
                "Series file {:?} holds {}, expected {}",
                path, stored.symbol, symbol
            );
        }

        let bars = stored
            .bars
            .into_iter()
            .enumerate()
            .map(|(i, b)| into_bar(symbol, i, b))
            .collect::<Result<Vec<_>, _>>()?;

        let series = Series::from_bars(symbol, bars)
            .map_err(|e| StorageError::InvalidRecord(format!("{}: {}", symbol, e)))?;

        debug!("Loaded {} bars for {}", series.len(), symbol);
        Ok(Some(series))
    }

    fn save(&self, series: &Series) -> Result<(), StorageError> {
        let path = self.path_for(series.symbol());
        let stored = StoredSeries {
            symbol: series.symbol().to_string(),
            bars: series.bars().iter().map(StoredBar::from).collect(),
        };
        let content = serde_json::to_string(&stored)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        debug!("Saved {} bars for {}", series.len(), series.symbol());
        Ok(())
    }
}
