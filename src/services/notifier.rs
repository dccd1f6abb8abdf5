//! Outbound alert delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::NotificationError;
use crate::types::Signal;

/// Delivers a rendered alert to some external channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name for logs.
    fn name(&self) -> &str;

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// Subject line for a signal, e.g. `Stock Alert: TCS.NS - Macd Bullish Crossover`.
pub fn alert_subject(signal: &Signal) -> String {
    format!("Stock Alert: {} - {}", signal.symbol, signal.kind.title())
}

/// Plain-text body for a signal.
pub fn alert_body(signal: &Signal) -> String {
    format!(
        "{kind} detected for {symbol}\n\
         \n\
         Bar: {bar}\n\
         Close: {price:.2}\n\
         Value: {value:.4}\n\
         Reference: {reference:.4}\n",
        kind = signal.kind.title(),
        symbol = signal.symbol,
        bar = signal.bar_timestamp.to_rfc3339(),
        price = signal.price,
        value = signal.value,
        reference = signal.reference,
    )
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// Posts `{"subject", "body"}` as JSON to a webhook URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let url = url.into();
        if url.is_empty() {
            return Err(NotificationError::NotConfigured("webhook URL is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { subject, body })
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Webhook rejected alert '{}': {}", subject, status);
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Writes alerts to the log. Used when no webhook is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!("ALERT {}\n{}", subject, body);
        Ok(())
    }
}
