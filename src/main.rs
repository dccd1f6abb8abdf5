mod api;

use axum::Router;
use chrono::Utc;
use crosswatch::config::Config;
use crosswatch::services::{
    AlertLedger, CrossoverDetector, FileSeriesStore, IndicatorEngine, LogNotifier, Notifier,
    Scanner, SeriesStore, SqliteLedgerStore, WebhookNotifier,
};
use crosswatch::sources::YahooFinanceClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<AlertLedger>,
    pub series_store: Arc<dyn SeriesStore>,
    pub engine: Arc<IndicatorEngine>,
    pub scanner: Arc<Scanner>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosswatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!(
        "Starting Crosswatch on {}:{} for {} symbols",
        config.host,
        config.port,
        config.scan.symbols.len()
    );

    let series_store: Arc<dyn SeriesStore> =
        Arc::new(FileSeriesStore::new(&config.storage.data_dir)?);

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => {
            info!("WEBHOOK_URL not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let ledger = Arc::new(AlertLedger::open(
        Box::new(SqliteLedgerStore::new(&config.storage.ledger_path)?),
        notifier,
    )?);

    let engine = Arc::new(IndicatorEngine::new(config.indicators.clone())?);

    let scanner = Arc::new(Scanner::new(
        config.scan.clone(),
        Arc::new(YahooFinanceClient::new()?),
        series_store.clone(),
        engine.clone(),
        CrossoverDetector::new(config.detector.clone()),
        ledger.clone(),
    )?);

    let state = AppState {
        config: config.clone(),
        ledger: ledger.clone(),
        series_store,
        engine,
        scanner: scanner.clone(),
    };

    // Periodic scans. Each tick runs in its own task so a slow scan shows up
    // as a skipped tick instead of delaying the schedule.
    {
        let scanner = scanner.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scanner.config().interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let scanner = scanner.clone();
                tokio::spawn(async move {
                    scanner.scan_all(Utc::now()).await;
                });
            }
        });
    }

    // Daily alert retention
    {
        let ledger = ledger.clone();
        let max_age = chrono::Duration::from_std(config.scan.alert_retention)?;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(86_400));
            loop {
                interval.tick().await;
                if let Err(e) = ledger.prune(max_age) {
                    error!("Failed to prune alert ledger: {}", e);
                }
            }
        });
    }

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Crosswatch server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
