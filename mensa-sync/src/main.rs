//! mensa-sync - Cafeteria menu sync service
//!
//! Pulls the daily menu feed, keeps the dish table in step with it and
//! backfills descriptions, tags, nutrition estimates and images for new or
//! changed dishes. An operator HTTP API triggers runs and reports results.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mensa_common::config::{
    default_config_path, load_toml_config, prepare_root_folder, resolve_root_folder, TomlConfig,
};
use mensa_sync::AppState;

/// Command-line arguments for mensa-sync
#[derive(Parser, Debug)]
#[command(name = "mensa-sync")]
#[command(about = "Cafeteria menu sync and metadata backfill service")]
#[command(version)]
struct Args {
    /// Port of the operator API (overrides the config file)
    #[arg(short, long, env = "MENSA_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: <config_dir>/mensa/mensa-sync.toml)
    #[arg(short, long, env = "MENSA_CONFIG")]
    config: Option<PathBuf>,

    /// Run the startup pipeline once and exit without serving the API
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mensa_sync=info,mensa_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting mensa-sync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path).context("Failed to load config file")?,
        None => {
            warn!("No config directory on this platform, using defaults");
            TomlConfig::default()
        }
    };

    // Root folder: CLI → ENV → TOML → OS default
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = prepare_root_folder(&root_folder).context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = mensa_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let store = mensa_sync::config::build_store(&db_pool, &toml_config).await?;
    let orchestrator = Arc::new(
        mensa_sync::config::build_orchestrator(&db_pool, &toml_config, Arc::clone(&store)).await?,
    );

    let state = AppState::new(db_pool, store, Arc::clone(&orchestrator));

    if args.once {
        let report = orchestrator.run_startup().await?;
        state.record_run(&report).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Startup pipeline runs in the background; the API is up meanwhile
    {
        let state = state.clone();
        tokio::spawn(async move {
            match state.orchestrator.run_startup().await {
                Ok(report) => state.record_run(&report).await,
                Err(e) => error!(error = %e, "Startup run did not start"),
            }
        });
    }

    let app = mensa_sync::build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
