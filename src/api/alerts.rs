//! Alert ledger endpoints.
//!
//! - GET    /api/alerts/recent   - Alerts sent within a window
//! - GET    /api/alerts/summary  - Ledger totals plus the latest alerts
//! - POST   /api/alerts/test     - Send a test notification
//! - POST   /api/alerts/prune    - Drop alerts past retention
//! - DELETE /api/alerts          - Clear the alert log

use axum::{
    extract::{Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{ActionResponse, ApiResponse};
use crate::AppState;
use crosswatch::error::{AppError, Result};
use crosswatch::types::{AlertRecord, AlertSummary};

const DEFAULT_WINDOW_HOURS: i64 = 24;
const OVERVIEW_RECENT_LIMIT: usize = 10;

/// Query parameters for the recent alerts endpoint.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Look-back window in hours (default: 24).
    pub hours: Option<i64>,
}

/// Query parameters for pruning.
#[derive(Debug, Deserialize)]
pub struct PruneQuery {
    /// Maximum age in days (default: the configured retention).
    pub days: Option<i64>,
}

/// Ledger totals plus the latest few alerts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOverview {
    #[serde(flatten)]
    pub summary: AlertSummary,
    pub recent: Vec<AlertRecord>,
}

/// Create the alerts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(get_recent))
        .route("/summary", get(get_summary))
        .route("/test", post(send_test))
        .route("/prune", post(prune_alerts))
        .route("/", delete(clear_alerts))
}

/// Alerts sent within the requested window, newest first.
async fn get_recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<AlertRecord>>>> {
    let hours = query.hours.unwrap_or(DEFAULT_WINDOW_HOURS);
    if hours <= 0 {
        return Err(AppError::BadRequest(format!(
            "hours must be positive, got {}",
            hours
        )));
    }

    let alerts = state.ledger.recent_alerts(Duration::hours(hours))?;
    Ok(Json(ApiResponse::new(alerts)))
}

async fn get_summary(State(state): State<AppState>) -> Result<Json<ApiResponse<AlertOverview>>> {
    let summary = state.ledger.summary()?;
    let mut recent = state
        .ledger
        .recent_alerts(Duration::hours(DEFAULT_WINDOW_HOURS))?;
    recent.truncate(OVERVIEW_RECENT_LIMIT);

    Ok(Json(ApiResponse::new(AlertOverview { summary, recent })))
}

async fn send_test(State(state): State<AppState>) -> Result<Json<ApiResponse<ActionResponse>>> {
    state.ledger.send_test_notification().await?;
    Ok(Json(ApiResponse::new(ActionResponse::affected(0))))
}

async fn prune_alerts(
    State(state): State<AppState>,
    Query(query): Query<PruneQuery>,
) -> Result<Json<ApiResponse<ActionResponse>>> {
    let max_age = match query.days {
        Some(days) if days <= 0 => {
            return Err(AppError::BadRequest(format!(
                "days must be positive, got {}",
                days
            )))
        }
        Some(days) => Duration::days(days),
        None => Duration::seconds(state.config.scan.alert_retention.as_secs() as i64),
    };

    let removed = state.ledger.prune(max_age)?;
    Ok(Json(ApiResponse::new(ActionResponse::affected(removed))))
}

async fn clear_alerts(State(state): State<AppState>) -> Result<Json<ApiResponse<ActionResponse>>> {
    let removed = state.ledger.clear()?;
    Ok(Json(ApiResponse::new(ActionResponse::affected(removed))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support;
    use crosswatch::types::{Signal, SignalKind};
    use chrono::{FixedOffset, TimeZone};

    fn signal(symbol: &str) -> Signal {
        let tz = FixedOffset::east_opt(19800).unwrap();
        Signal {
            symbol: symbol.to_string(),
            kind: SignalKind::MfiBullishCrossover,
            value: 52.0,
            reference: 50.0,
            price: 1450.0,
            bar_timestamp: tz.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_recent_rejects_non_positive_window() {
        let dir = tempfile::tempdir().unwrap();
        let result = get_recent(
            State(test_support::state(dir.path())),
            Query(RecentQuery { hours: Some(0) }),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_recent_lists_dispatched_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        state.ledger.record_if_new(&signal("INFY.NS")).await.unwrap();

        let Json(response) = get_recent(State(state), Query(RecentQuery { hours: None }))
            .await
            .unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].symbol, "INFY.NS");
    }

    #[tokio::test]
    async fn test_summary_shape() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        state.ledger.record_if_new(&signal("INFY.NS")).await.unwrap();

        let Json(response) = get_summary(State(state)).await.unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["total"], 1);
        assert_eq!(json["data"]["today"], 1);
        assert_eq!(json["data"]["mostActiveSymbol"], "INFY.NS");
        assert_eq!(json["data"]["recent"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        state.ledger.record_if_new(&signal("INFY.NS")).await.unwrap();
        state.ledger.record_if_new(&signal("TCS.NS")).await.unwrap();

        let Json(response) = clear_alerts(State(state.clone())).await.unwrap();
        assert!(response.data.success);
        assert_eq!(response.data.affected, 2);
        assert!(state.ledger.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());
        state.ledger.record_if_new(&signal("INFY.NS")).await.unwrap();

        let Json(response) = prune_alerts(State(state.clone()), Query(PruneQuery { days: None }))
            .await
            .unwrap();
        assert_eq!(response.data.affected, 0);
        assert_eq!(state.ledger.len().unwrap(), 1);

        let result = prune_alerts(State(state), Query(PruneQuery { days: Some(0) })).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_send_test_notification() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state(dir.path());

        let Json(response) = send_test(State(state.clone())).await.unwrap();
        assert!(response.data.success);
        assert!(state.ledger.is_empty().unwrap());
    }
}
