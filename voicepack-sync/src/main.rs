//! Package sync service (voicepack-sync) - main entry point
//!
//! Serves reconciliation and download control for the local voice packages
//! over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicepack_common::config::{resolve_root_folder, TomlConfig, CONFIG_FILE_NAME};
use voicepack_common::db::init_database_pool;
use voicepack_common::EventBus;
use voicepack_sync::api::{self, AppState};
use voicepack_sync::layout::PackageLayout;
use voicepack_sync::store::SqliteComponentStore;
use voicepack_sync::sync::{PackageSync, SyncSettings};

/// Command-line arguments for voicepack-sync
#[derive(Parser, Debug)]
#[command(name = "voicepack-sync")]
#[command(about = "Voice package sync service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and configuration
    #[arg(short, long, env = "VOICEPACK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to <root>/voicepack.toml)
    #[arg(short, long, env = "VOICEPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, env = "VOICEPACK_SYNC_PORT")]
    port: Option<u16>,

    /// Target package version (overrides the configuration file)
    #[arg(long, env = "VOICEPACK_TARGET_VERSION")]
    target_version: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let bootstrap_root = resolve_root_folder(args.root_folder.as_deref(), None);
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| bootstrap_root.join(CONFIG_FILE_NAME));
    let config = TomlConfig::load(&config_path).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "voicepack_sync={},voicepack_common={},tower_http=debug",
                    config.logging.level, config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !config_path.exists() {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config.root_folder.as_deref());
    let port = args.port.unwrap_or(config.port);
    let target_version = args
        .target_version
        .clone()
        .unwrap_or_else(|| config.target_version.clone());

    info!("Starting voicepack-sync on port {}", port);
    info!("Root folder: {}", root_folder.display());
    info!("Target version: {}", target_version);

    let db_path = config.database_path(&root_folder);
    let pool = init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database ready at {}", db_path.display());

    let layout = PackageLayout::builtin().with_overrides(&config.components);
    let sync = Arc::new(
        PackageSync::new(
            Arc::new(SqliteComponentStore::new(pool)),
            layout,
            SyncSettings {
                target_version,
                package_url_prefix: config.package_url_prefix.clone(),
                request_timeout: Duration::from_millis(config.request_timeout_ms),
            },
            EventBus::default(),
        )
        .context("Failed to initialize package sync")?,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = AppState::new(Arc::clone(&sync));

    let shutdown_sync = Arc::clone(&sync);
    api::run(addr, state, async move {
        shutdown_signal().await;
        shutdown_sync.cancel_all();
    })
    .await
    .context("Server error")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
