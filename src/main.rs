//! HomeDrive server — personal cloud storage core.
//!
//! Wires configuration, the database, blob storage, and the services
//! together, then runs the trash reaper until shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use homedrive_core::config::AppConfig;
use homedrive_core::error::AppError;
use homedrive_database::repositories::{
    ActivityRepository, EntryRepository, ShareRepository, UserRepository,
};
use homedrive_storage::LocalBlobStore;
use homedrive_worker::{ReaperRunner, TrashReaper};

#[tokio::main]
async fn main() {
    let env = std::env::var("HOMEDRIVE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting HomeDrive v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db_pool = homedrive_database::DatabasePool::connect(&config.database).await?;
    homedrive_database::migration::run_migrations(db_pool.pool()).await?;

    // ── Step 2: Blob storage ─────────────────────────────────────
    let blobs = Arc::new(LocalBlobStore::new(&config.storage.root_path).await?);
    tracing::info!(root = %config.storage.root_path, "Blob storage ready");

    // ── Step 3: Repositories ─────────────────────────────────────
    let entry_repo = Arc::new(EntryRepository::new(db_pool.pool().clone()));
    let user_repo = Arc::new(UserRepository::new(db_pool.pool().clone()));
    let share_repo = Arc::new(ShareRepository::new(db_pool.pool().clone()));
    let activity_repo = Arc::new(ActivityRepository::new(db_pool.pool().clone()));

    // ── Step 4: Services ─────────────────────────────────────────
    let hierarchy_service = Arc::new(homedrive_service::hierarchy::HierarchyService::new(
        entry_repo.clone(),
        blobs.clone(),
        activity_repo.clone(),
    ));
    let upload_service = Arc::new(homedrive_service::file::UploadService::new(
        entry_repo.clone(),
        user_repo.clone(),
        blobs.clone(),
        activity_repo.clone(),
        config.storage.max_upload_size_bytes,
    ));
    let download_service = Arc::new(homedrive_service::file::DownloadService::new(
        entry_repo.clone(),
        blobs.clone(),
        activity_repo.clone(),
    ));
    let share_service = Arc::new(homedrive_service::share::ShareService::new(
        share_repo.clone(),
        entry_repo.clone(),
        activity_repo.clone(),
    ));
    let share_access_service = Arc::new(homedrive_service::share::ShareAccessService::new(
        share_repo.clone(),
        entry_repo.clone(),
        blobs.clone(),
    ));
    let storage_service = Arc::new(homedrive_service::storage::StorageService::new(
        entry_repo.clone(),
        user_repo.clone(),
        blobs.clone(),
        activity_repo.clone(),
        config.quota.default_quota_bytes,
    ));
    tracing::info!("Services initialized");

    // The transport layer is expected to hold these; until it lands
    // they only need to stay alive for the reaper's lifetime.
    let _services = (
        hierarchy_service,
        upload_service,
        download_service,
        share_service,
        share_access_service,
        storage_service,
    );

    // ── Step 5: Trash reaper ─────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper = Arc::new(TrashReaper::new(
        entry_repo.clone(),
        blobs.clone(),
        config.reaper.retention_days,
    ));
    let runner = ReaperRunner::new(reaper, config.reaper.clone());
    let reaper_handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    // ── Step 6: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(std::time::Duration::from_secs(30), reaper_handle).await;
    db_pool.close().await;

    tracing::info!("HomeDrive shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
