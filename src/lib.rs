//! Crosswatch - crossover alert engine for exchange-listed stocks

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use types::*;
pub use services::{AlertLedger, CrossoverDetector, IndicatorEngine, Scanner, SeriesMerger};
