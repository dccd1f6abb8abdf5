use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use crosswatch::error::Result;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    symbols: usize,
    scanning: bool,
    alerts: usize,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        symbols: state.config.scan.symbols.len(),
        scanning: state.scanner.is_scanning(),
        alerts: state.ledger.len()?,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
