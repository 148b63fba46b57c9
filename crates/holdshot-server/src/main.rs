//! # holdshot-server
//!
//! Ingest and catalog server for hold-to-capture screenshot uploads.
//!
//! This binary provides:
//! - **Multipart ingest** that stores screenshots per user with
//!   collision-free, time-ordered names
//! - **Catalog API** (axum) for listing users and images and for batch
//!   deletion of a user's images
//! - **Change polling** backed by a single version counter, so "anything
//!   new since V?" costs one integer comparison
//! - **Static file serving** of the storage root for gallery frontends

mod api;
mod config;
mod error;
mod store;
mod sync;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::store::ImageStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,holdshot_server=debug")),
        )
        .init();

    info!("Starting holdshot server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize the image store (creates the directory if missing)
    // -----------------------------------------------------------------------
    let store = Arc::new(ImageStore::new(config.storage_root.clone()).await?);

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
