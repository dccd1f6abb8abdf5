//! Yahoo Finance API client for intraday and daily stock bars.
//!
//! Uses the unofficial chart endpoint. Bars are stamped in the exchange's
//! own UTC offset as reported by the response metadata.

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::BarSource;
use crate::error::SourceError;
use crate::types::Bar;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart response.
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

/// Yahoo interval string for a bar width, e.g. `60m` or `1d`.
fn interval_for(granularity: Duration) -> Result<&'static str, SourceError> {
    match granularity.as_secs() {
        60 => Ok("1m"),
        120 => Ok("2m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("60m"),
        5400 => Ok("90m"),
        86_400 => Ok("1d"),
        secs => Err(SourceError::Request(format!(
            "unsupported granularity: {}s",
            secs
        ))),
    }
}

/// Turn a chart response into bars, skipping rows with any null column.
fn parse_chart(symbol: &str, data: YahooChartResponse) -> Result<Vec<Bar>, SourceError> {
    if let Some(error) = data.chart.error {
        return Err(SourceError::Status(format!(
            "{} - {}",
            error.code, error.description
        )));
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| SourceError::Empty(symbol.to_string()))?;

    let offset = FixedOffset::east_opt(result.meta.gmtoffset)
        .ok_or_else(|| SourceError::Parse(format!("bad gmtoffset {}", result.meta.gmtoffset)))?;

    // A symbol with no trades in the window has no timestamp array at all.
    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Parse("no quote data in response".to_string()))?;

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            column(&opens, i),
            column(&highs, i),
            column(&lows, i),
            column(&closes, i),
            volumes.get(i).copied().flatten(),
        ) else {
            continue;
        };

        let Some(timestamp) = offset.timestamp_opt(ts, 0).single() else {
            continue;
        };

        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }

    Ok(bars)
}

/// Yahoo Finance API client.
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(BASE_URL)
    }

    /// Client against a different chart endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl BarSource for YahooFinanceClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(
        &self,
        symbol: &str,
        lookback: Duration,
        granularity: Duration,
    ) -> Result<Vec<Bar>, SourceError> {
        let interval = interval_for(granularity)?;
        let period2 = Utc::now().timestamp();
        let period1 = period2 - lookback.as_secs() as i64;
        let url = format!(
            "{}/{}?period1={}&period2={}&interval={}&includePrePost=false",
            self.base_url,
            symbol.to_uppercase(),
            period1,
            period2,
            interval
        );

        debug!("Fetching Yahoo Finance data: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().to_string()));
        }

        let data: YahooChartResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let bars = parse_chart(symbol, data)?;
        debug!("Yahoo returned {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}
