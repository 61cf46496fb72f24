//! Random Wallpaper API
//!
//! Serves a random image per request, chosen from per-device key indexes
//! that a scheduled task rebuilds from the blob store.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use wallpaper_api::{
    spawn_refresh_schedule, start_server, ApiConfig, IndexRefresher, Result, ServerState,
    SharedState,
};
use wallpaper_store::{BlobStore, FileBlobStore, FileKeyIndexStore, KeyIndexStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("wallpaper_api=info".parse()?)
        .add_directive("wallpaper_store=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Random Wallpaper API...");

    let config = ApiConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Index dir: {:?}", config.index_dir);
    info!("Blob dir: {:?}", config.blob_dir);
    for partition in config.partitions.iter() {
        info!(
            "Partition {}: index {} <- prefix {}",
            partition.class, partition.index_name, partition.prefix
        );
    }
    info!(
        "Refresh interval: {} seconds (on startup: {})",
        config.refresh_interval.as_secs(),
        config.refresh_on_startup
    );

    let index_store = FileKeyIndexStore::new(&config.index_dir);
    index_store.init().await?;
    let blob_store = FileBlobStore::new(&config.blob_dir);
    blob_store.init().await?;

    let index_store: Arc<dyn KeyIndexStore> = Arc::new(index_store);
    let blob_store: Arc<dyn BlobStore> = Arc::new(blob_store);

    // Timer flow: rebuild indexes independently of request handling
    let refresher = Arc::new(IndexRefresher::new(
        index_store.clone(),
        blob_store.clone(),
        config.partitions.clone(),
    ));
    spawn_refresh_schedule(refresher, config.refresh_interval, config.refresh_on_startup);

    let state: SharedState = Arc::new(ServerState::new(index_store, blob_store, config.partitions));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
