//! Autopilot API - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use autopilot_api::config::AppConfig;
use autopilot_api::logging::init_tracing;
use autopilot_api::scheduler::spawn_ticker;
use autopilot_api::server::create_app;

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "autopilot-api")]
#[command(about = "Autopilot API - scheduled content generation and publishing")]
#[command(version)]
struct Args {
    /// Host to bind to. Overrides `server.host`.
    #[arg(long, env = "AUTOPILOT_API_HOST")]
    host: Option<String>,

    /// Port to listen on. Overrides `server.port`.
    #[arg(short, long, env = "AUTOPILOT_API_PORT")]
    port: Option<u16>,

    /// SQLite database path. Overrides `database.path`.
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    init_tracing(&config.logging);
    tracing::info!("Starting Autopilot API v{}", env!("CARGO_PKG_VERSION"));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let tick_interval = config.scheduler.tick_interval();

    let (app, state) = create_app(config).await?;
    tracing::info!("Application initialized");

    let shutdown = CancellationToken::new();
    let ticker = match tick_interval {
        Some(interval) => Some(spawn_ticker(
            Arc::clone(&state.executor),
            interval,
            shutdown.clone(),
        )),
        None => {
            tracing::info!("In-process ticker disabled, waiting for /api/cron/autopilot");
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = ticker {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Ticker task ended abnormally");
        }
    }

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown.cancel();
}
