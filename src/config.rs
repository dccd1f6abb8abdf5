use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default scan universe (NSE large caps).
const DEFAULT_SYMBOLS: &[&str] = &[
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "INFY.NS",
    "ICICIBANK.NS",
    "HINDUNILVR.NS",
    "ITC.NS",
    "SBIN.NS",
    "BHARTIARTL.NS",
    "KOTAKBANK.NS",
];

/// Indicator windows and thresholds used by the indicator engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    /// MACD fast EMA span (default: 12).
    pub macd_fast: usize,
    /// MACD slow EMA span (default: 26).
    pub macd_slow: usize,
    /// MACD signal EMA span (default: 9).
    pub macd_signal: usize,
    /// RSI rolling window (default: 14).
    pub rsi_period: usize,
    /// MFI rolling window (default: 14).
    pub mfi_period: usize,
    /// Short volume SMA window (default: 20).
    pub volume_ma_short: usize,
    /// Long volume SMA window (default: 50).
    pub volume_ma_long: usize,
    /// Volume surge multiplier over the short SMA (default: 1.5).
    pub volume_surge_multiplier: f64,
    /// MFI midline for crossover flags (default: 50).
    pub mfi_midline: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            mfi_period: 14,
            volume_ma_short: 20,
            volume_ma_long: 50,
            volume_surge_multiplier: 1.5,
            mfi_midline: 50.0,
        }
    }
}

impl IndicatorConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            macd_fast: env_or("MACD_FAST", defaults.macd_fast),
            macd_slow: env_or("MACD_SLOW", defaults.macd_slow),
            macd_signal: env_or("MACD_SIGNAL", defaults.macd_signal),
            rsi_period: env_or("RSI_PERIOD", defaults.rsi_period),
            mfi_period: env_or("MFI_PERIOD", defaults.mfi_period),
            volume_ma_short: env_or("VOLUME_MA_SHORT", defaults.volume_ma_short),
            volume_ma_long: env_or("VOLUME_MA_LONG", defaults.volume_ma_long),
            volume_surge_multiplier: env_or(
                "VOLUME_SURGE_MULTIPLIER",
                defaults.volume_surge_multiplier,
            ),
            mfi_midline: env_or("MFI_MIDLINE", defaults.mfi_midline),
        }
    }
}

/// Thresholds used by the crossover detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// RSI level an oversold recovery must cross (default: 30).
    pub rsi_oversold: f64,
    /// MFI midline reported as the crossover reference (default: 50).
    pub mfi_midline: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            mfi_midline: 50.0,
        }
    }
}

/// Scan scheduling and market data settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Symbols to scan.
    pub symbols: Vec<String>,
    /// Canonical bar width (default: 4 hours).
    pub period: Duration,
    /// Width of raw bars requested from the source (default: 1 hour).
    pub granularity: Duration,
    /// Lookback for a symbol with no stored series (default: 180 days).
    pub initial_lookback: Duration,
    /// Lookback for incremental updates (default: 5 days).
    pub update_lookback: Duration,
    /// Time between scan cycles (default: 300 seconds).
    pub interval: Duration,
    /// Symbols processed in parallel (default: 4).
    pub concurrency: usize,
    /// Minimum spacing between fetches to the source (default: 500 ms).
    pub request_delay: Duration,
    /// Bars kept per series after a merge (default: 1000).
    pub max_history_bars: usize,
    /// How long dispatched alerts are kept (default: 7 days). A latest bar
    /// older than this is no longer alerted on.
    pub alert_retention: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            period: Duration::from_secs(4 * 3600),
            granularity: Duration::from_secs(3600),
            initial_lookback: Duration::from_secs(180 * 86_400),
            update_lookback: Duration::from_secs(5 * 86_400),
            interval: Duration::from_secs(300),
            concurrency: 4,
            request_delay: Duration::from_millis(500),
            max_history_bars: 1000,
            alert_retention: Duration::from_secs(7 * 86_400),
        }
    }
}

/// Persistence and notification settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON series file per symbol.
    pub data_dir: PathBuf,
    /// SQLite file backing the alert ledger.
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("stock_data"),
            ledger_path: PathBuf::from("stock_data/alerts.db"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Webhook URL for alert delivery. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    pub indicators: IndicatorConfig,
    pub detector: DetectorConfig,
    pub scan: ScanConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Format: "RELIANCE.NS,TCS.NS,INFY.NS"
        let symbols = env::var("SYMBOLS")
            .ok()
            .map(|s| parse_symbols(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ScanConfig::default().symbols);

        let indicators = IndicatorConfig::from_env();
        let detector = DetectorConfig {
            rsi_oversold: env_or("RSI_OVERSOLD", 30.0),
            mfi_midline: indicators.mfi_midline,
        };

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "stock_data".into()));
        let ledger_path = env::var("LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("alerts.db"));

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 3001),
            webhook_url: env::var("WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
            indicators,
            detector,
            scan: ScanConfig {
                symbols,
                period: Duration::from_secs(env_or::<u64>("PERIOD_HOURS", 4) * 3600),
                granularity: Duration::from_secs(env_or::<u64>("GRANULARITY_MINUTES", 60) * 60),
                initial_lookback: Duration::from_secs(
                    env_or::<u64>("INITIAL_LOOKBACK_DAYS", 180) * 86_400,
                ),
                update_lookback: Duration::from_secs(
                    env_or::<u64>("UPDATE_LOOKBACK_DAYS", 5) * 86_400,
                ),
                interval: Duration::from_secs(env_or::<u64>("SCAN_INTERVAL_SECS", 300).max(1)),
                concurrency: env_or::<usize>("SCAN_CONCURRENCY", 4).max(1),
                request_delay: Duration::from_millis(env_or("REQUEST_DELAY_MS", 500)),
                max_history_bars: env_or("MAX_HISTORY_BARS", 1000),
                alert_retention: Duration::from_secs(
                    env_or::<u64>("ALERT_RETENTION_DAYS", 7).max(1) * 86_400,
                ),
            },
            storage: StorageConfig {
                data_dir,
                ledger_path,
            },
        }
    }
}

/// Parse a comma-separated symbol list, trimming and upper-casing entries.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
