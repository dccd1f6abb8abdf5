pub mod yahoo;

pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SourceError;
use crate::types::Bar;

/// A market data provider returning raw bars at a requested granularity.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Short source name for logs.
    fn name(&self) -> &str;

    /// Raw bars for `symbol` covering roughly the last `lookback`, each
    /// `granularity` wide. Order and uniqueness are not guaranteed.
    async fn fetch(
        &self,
        symbol: &str,
        lookback: Duration,
        granularity: Duration,
    ) -> Result<Vec<Bar>, SourceError>;
}
