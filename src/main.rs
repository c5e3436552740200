//! identlab: MySQL identifier-injection lab.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration, opens and validates the database pool, sets up the Axum
//! router and serves until a shutdown signal, then closes the pool.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use identlab::config::{AppConfig, LoggingConfig, DEFAULT_LISTEN_ADDR, DEFAULT_LOG_FILTER};
use identlab::{create_router, AppState, FruitStore, MySqlStore, ParamMode};

/// identlab: allow-listed vs injectable SQL identifiers over HTTP
#[derive(Parser, Debug)]
#[command(name = "identlab", version, about)]
#[command(after_help = AFTER_HELP)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level filter (e.g., "identlab=debug,sqlx=warn")
    #[arg(short, long)]
    log_level: Option<String>,
}

const AFTER_HELP: &str = const_format::formatcp!(
    "Listens on {} unless [http] says otherwise. DB_HOST, DB_USER, DB_PASS and DB_NAME override [database].",
    DEFAULT_LISTEN_ADDR
);

fn init_tracing(filter: &str, logging: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));

    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Configuration comes first so the log format is known
    let config = AppConfig::load(args.config.as_deref())?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, &config.logging);

    let mode = ParamMode::ServerPrepared;
    tracing::info!(
        dsn = %config.database.dsn(mode.interpolates()),
        mode = %mode,
        "Loaded configuration"
    );

    let store = Arc::new(MySqlStore::connect(&config.database, mode));
    if let Err(e) = store.ping().await {
        tracing::error!(error = %e, host = %config.database.host, "Database unreachable at startup");
        return Err(e.into());
    }
    tracing::info!("Database connection verified");

    let state = AppState::new(store.clone());
    let app = create_router(state);

    let served = identlab::http::start_server(app, &config.http).await;

    store.close().await;
    tracing::info!("Database pool closed");

    served?;
    Ok(())
}
