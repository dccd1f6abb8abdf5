//! Per-symbol data and indicator endpoints.
//!
//! - GET  /api/symbols/status            - Data status per configured symbol
//! - POST /api/symbols/scan              - Scan every configured symbol now
//! - GET  /api/symbols/:symbol/summary   - Latest indicator snapshot
//! - POST /api/symbols/:symbol/refresh   - Re-download history and rescan

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use super::ApiResponse;
use crate::AppState;
use crosswatch::error::{AppError, Result};
use crosswatch::services::{ScanReport, SymbolReport, SymbolStatus};
use crosswatch::types::IndicatorSummary;

/// Create the symbols router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(scan_now))
        .route("/:symbol/summary", get(get_summary))
        .route("/:symbol/refresh", post(refresh))
}

async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<Vec<SymbolStatus>>> {
    Json(ApiResponse::new(state.scanner.status(Utc::now())))
}

/// Latest indicator snapshot computed from the stored series.
async fn get_summary(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<IndicatorSummary>>> {
    let symbol = symbol.to_uppercase();
    let series = state
        .series_store
        .load(&symbol)?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::NotFound(format!("No data stored for {}", symbol)))?;

    let sets = state.engine.compute(&series)?;
    let summary = IndicatorSummary::from_latest(&series, &sets, state.engine.config().mfi_midline)
        .ok_or_else(|| AppError::NotFound(format!("No data stored for {}", symbol)))?;

    Ok(Json(ApiResponse::new(summary)))
}

/// Run a batch scan immediately instead of waiting for the next tick.
async fn scan_now(State(state): State<AppState>) -> Result<Json<ApiResponse<ScanReport>>> {
    let report = state
        .scanner
        .scan_all(Utc::now())
        .await
        .ok_or_else(|| AppError::Conflict("A scan is already in progress".to_string()))?;
    Ok(Json(ApiResponse::new(report)))
}

/// Force a full re-download for one configured symbol.
async fn refresh(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<SymbolReport>>> {
    let symbol = symbol.to_uppercase();
    if !state.config.scan.symbols.contains(&symbol) {
        return Err(AppError::NotFound(format!("{} is not a watched symbol", symbol)));
    }

    let report = state.scanner.refresh_symbol(&symbol, Utc::now()).await?;
    Ok(Json(ApiResponse::new(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{self, STATIC_BUCKETS};
    use crosswatch::types::{Bar, Series};
    use chrono::{FixedOffset, TimeZone};

    fn stored_series(state: &AppState, n: usize) {
        let tz = FixedOffset::east_opt(19800).unwrap();
        let bars = (0..n)
            .map(|i| {
                let ts = tz.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(4 * i as i64);
                let c = 500.0 + (i % 9) as f64 * 3.0;
                Bar::new(ts, c - 1.0, c + 2.0, c - 2.0, c, 10_000 + i as u64 * 10)
            })
            .collect();
        let series = Series::from_bars("TCS.NS", bars).unwrap();
        state.series_store.save(&series).unwrap();
    }

    #[tokio::test]
    async fn test_summary_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = get_summary(
            State(test_support::state(dir.path())),
            Path("TCS.NS".to_string()),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_summary_for_stored_series() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        stored_series(&state, 40);

        let Json(response) = get_summary(State(state), Path("tcs.ns".to_string()))
            .await
            .unwrap();
        let summary = response.data;
        assert_eq!(summary.symbol, "TCS.NS");
        assert!(summary.macd.value.is_some());
        assert!(summary.rsi.value.is_some());
        assert!(summary.price.change.is_some());
    }

    #[tokio::test]
    async fn test_status_lists_configured_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        stored_series(&state, 3);

        let Json(response) = get_status(State(state)).await;
        let symbols: Vec<&str> = response.data.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TCS.NS", "INFY.NS"]);
        assert_eq!(response.data[0].bars, 3);
        assert_eq!(response.data[1].bars, 0);
    }

    #[tokio::test]
    async fn test_scan_now_covers_all_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());

        let Json(response) = scan_now(State(state.clone())).await.unwrap();
        assert_eq!(response.data.symbols, 2);
        assert_eq!(response.data.succeeded, 2);
        assert!(!state.scanner.is_scanning());

        let stored = state.series_store.load("INFY.NS").unwrap().unwrap();
        assert_eq!(stored.len(), STATIC_BUCKETS);
    }

    #[tokio::test]
    async fn test_refresh_watched_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());

        let Json(response) = refresh(State(state.clone()), Path("tcs.ns".to_string()))
            .await
            .unwrap();
        assert_eq!(response.data.symbol, "TCS.NS");
        assert!(response.data.fetched);
        assert_eq!(response.data.bars, STATIC_BUCKETS);

        let status = state.scanner.status(Utc::now());
        assert!(status[0].last_scan.is_some());
    }

    #[tokio::test]
    async fn test_refresh_unknown_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let result = refresh(
            State(test_support::state(dir.path())),
            Path("WIPRO.NS".to_string()),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
