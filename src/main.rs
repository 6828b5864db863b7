use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repodeck::config::Config;
use repodeck::AppState;

#[derive(Parser, Debug)]
#[command(name = "repodeck")]
#[command(author, version, about = "Self-hosted GitHub repository management dashboard", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "repodeck.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration; a missing server secret is fatal here
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Repodeck v{}", env!("CARGO_PKG_VERSION"));

    if config.webhooks.github_secret.is_none() {
        if config.webhooks.allow_unverified {
            tracing::warn!(
                "Webhook signature verification is DISABLED (allow_unverified). \
                 Every delivery will be accepted without authentication."
            );
        } else {
            tracing::info!(
                "No webhook secret configured; inbound webhook deliveries will be rejected"
            );
        }
    }

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database
    let db = repodeck::db::init(&config.server.data_dir).await?;

    // Create app state (derives the token-encryption and session keys once)
    let state = Arc::new(AppState::new(config.clone(), db));

    let app = repodeck::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
