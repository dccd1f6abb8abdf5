pub mod alerts;
pub mod health;
pub mod symbols;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Result of an operator action.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub affected: usize,
}

impl ActionResponse {
    pub fn affected(affected: usize) -> Self {
        Self {
            success: true,
            affected,
        }
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/alerts", alerts::router())
        .nest("/api/symbols", symbols::router())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::AppState;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, FixedOffset, TimeZone};
    use crosswatch::config::{Config, ScanConfig, StorageConfig};
    use crosswatch::error::SourceError;
    use crosswatch::services::{
        AlertLedger, CrossoverDetector, FileSeriesStore, IndicatorEngine, LogNotifier, Scanner,
        SeriesStore, SqliteLedgerStore,
    };
    use crosswatch::sources::BarSource;
    use crosswatch::types::Bar;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    /// Buckets returned by [`StaticSource`] for every symbol.
    pub const STATIC_BUCKETS: usize = 40;

    /// Serves the same hourly bars for every symbol.
    struct StaticSource;

    #[async_trait]
    impl BarSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(
            &self,
            _symbol: &str,
            _lookback: Duration,
            _granularity: Duration,
        ) -> Result<Vec<Bar>, SourceError> {
            let start = FixedOffset::east_opt(19800)
                .unwrap()
                .with_ymd_and_hms(2024, 6, 3, 0, 0, 0)
                .unwrap();
            Ok((0..STATIC_BUCKETS as i64 * 4)
                .map(|h| {
                    let c = 700.0 + (h % 11) as f64 * 1.5;
                    let ts = start + ChronoDuration::hours(h);
                    Bar::new(ts, c - 0.5, c + 1.0, c - 1.0, c, 2_000 + h as u64)
                })
                .collect())
        }
    }

    /// App state over a temporary data directory, watching TCS.NS and INFY.NS.
    pub fn state(dir: &Path) -> AppState {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            webhook_url: None,
            indicators: Default::default(),
            detector: Default::default(),
            scan: ScanConfig {
                symbols: vec!["TCS.NS".to_string(), "INFY.NS".to_string()],
                request_delay: Duration::ZERO,
                ..Default::default()
            },
            storage: StorageConfig {
                data_dir: dir.to_path_buf(),
                ledger_path: dir.join("alerts.db"),
            },
        };

        let series_store: Arc<dyn SeriesStore> =
            Arc::new(FileSeriesStore::new(&config.storage.data_dir).unwrap());
        let ledger = Arc::new(
            AlertLedger::open(
                Box::new(SqliteLedgerStore::new_in_memory().unwrap()),
                Arc::new(LogNotifier),
            )
            .unwrap(),
        );
        let engine = Arc::new(IndicatorEngine::default());
        let scanner = Arc::new(
            Scanner::new(
                config.scan.clone(),
                Arc::new(StaticSource),
                series_store.clone(),
                engine.clone(),
                CrossoverDetector::default(),
                ledger.clone(),
            )
            .unwrap(),
        );

        AppState {
            config: Arc::new(config),
            ledger,
            series_store,
            engine,
            scanner,
        }
    }
}
