use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde_json::json;
use thiserror::Error;

/// Failures of the indicator engine. Numeric edge cases are never errors;
/// they surface as undefined cells instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("missing or invalid {column} value at bar {index}")]
    MissingColumn { column: &'static str, index: usize },

    #[error("invalid indicator configuration: {0}")]
    InvalidConfig(String),
}

/// Failures of series construction and merging. The prior series is always
/// left untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("timestamps out of order at bar {index}: {previous} is not before {current}")]
    InvalidTimestampOrder {
        index: usize,
        previous: DateTime<FixedOffset>,
        current: DateTime<FixedOffset>,
    },

    #[error("invalid aggregation period: {0}")]
    InvalidPeriod(String),
}

/// Persistence failures for the series store and the ledger store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored series for {symbol} is missing {column} at bar {index}")]
    MissingColumn {
        symbol: String,
        column: &'static str,
        index: usize,
    },

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Notifier dispatch failures. The ledger recovers from these locally by
/// skipping the write, so the next scan retries.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

/// Market data retrieval failures.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Status(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data returned for {0}")]
    Empty(String),
}

/// Failure of one symbol's scan cycle.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// HTTP API error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Indicator(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::Scan(ScanError::Source(e)) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Scan(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Notification(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
