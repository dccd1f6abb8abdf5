pub mod crossover;
pub mod indicators;
pub mod ledger;
pub mod merger;
pub mod notifier;
pub mod scanner;
pub mod series_store;
pub mod sqlite_store;

pub use crossover::CrossoverDetector;
pub use indicators::{Indicator, IndicatorEngine};
pub use ledger::AlertLedger;
pub use merger::{Freshness, SeriesMerger};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use scanner::{ScanReport, Scanner, SymbolReport, SymbolStatus};
pub use series_store::{FileSeriesStore, SeriesStore};
pub use sqlite_store::{LedgerStore, SqliteLedgerStore};
