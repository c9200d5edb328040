use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retrade::api::{metrics, rate_limit};
use retrade::cli::{self, Cli};
use retrade::config::{Config, LogFormat};
use retrade::AppState;

fn init_tracing(config: &Config, cli: &Cli) {
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    init_tracing(&config, &cli);

    if !cli.is_serve() {
        return cli::run_command(&cli).await;
    }

    tracing::info!("Starting ReTrade v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    // Initialize database
    let db = retrade::db::init(&config.database).await?;

    // Image storage
    let images = retrade::storage::build_store(&config).await?;

    if !cli.skip_checks {
        let report = retrade::startup::run_startup_checks(&config, &db, images.as_ref()).await;
        if !report.all_critical_passed {
            anyhow::bail!(
                "Startup checks failed: {}",
                report.critical_failures().join(", ")
            );
        }
    }

    // Create app state
    let mut state = AppState::new(config.clone(), db, images);
    match metrics::init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "Metrics disabled"),
    }
    let state = Arc::new(state);

    if config.rate_limit.enabled {
        rate_limit::spawn_cleanup_task(
            state.rate_limiter.clone(),
            config.rate_limit.cleanup_interval,
        );
    }

    let app = retrade::create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
