//! Background agent that watches the primary pointer button and uploads
//! a screenshot of the primary display whenever the button is held past
//! the configured threshold.
//!
//! - Global pointer hook feeding a bounded event channel
//! - Hold-gesture detection with a runtime-adjustable threshold
//! - Capture, PNG encoding and multipart upload off the event loop

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use holdshot_client::capture::PrimaryDisplayCapture;
use holdshot_client::gesture::EVENT_BUFFER;
use holdshot_client::{hook, ConfigService, GestureDetector, Uploader};
use holdshot_shared::constants::UPLOAD_TIMEOUT_SECS;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Logging ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,holdshot_client=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting holdshot client v{}", env!("CARGO_PKG_VERSION"));

    // --- 2. Configuration ---
    let config = ConfigService::from_env();
    let snapshot = config.snapshot().await;
    info!(
        user = %snapshot.username,
        server = %snapshot.server_url,
        hold_secs = snapshot.hold_threshold.as_secs_f64(),
        "Client configured"
    );

    // --- 3. Upload pipeline ---
    let uploader = Uploader::new(config.clone(), Arc::new(PrimaryDisplayCapture::new()))?;

    // --- 4. Pointer hook ---
    let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
    hook::install(events_tx)?;
    info!("Pointer hook installed");

    // --- 5. Gesture loop ---
    let mut detector = GestureDetector::new();
    let mut uploads = JoinSet::new();
    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("Pointer event channel closed");
                    break;
                };
                // Read the threshold per event so configuration changes
                // apply to gestures already in progress.
                let threshold = config.hold_threshold().await;
                if let Some(trigger) = detector.on_event(event, threshold) {
                    info!(
                        held_ms = trigger.held.as_millis() as u64,
                        "Hold gesture detected, capturing screenshot"
                    );
                    let uploader = uploader.clone();
                    uploads.spawn(async move {
                        if let Err(e) = uploader.capture_and_send(trigger.held).await {
                            warn!(error = %e, "Screenshot upload failed");
                        }
                    });
                }
            }
            // Reap finished uploads so the set does not grow unbounded.
            Some(_) = uploads.join_next(), if !uploads.is_empty() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    drain_uploads(&mut uploads).await;
    Ok(())
}

/// Give in-flight uploads a bounded window to finish before exiting.
async fn drain_uploads(uploads: &mut JoinSet<()>) {
    if uploads.is_empty() {
        return;
    }
    info!(in_flight = uploads.len(), "Waiting for uploads to finish");
    let drain = async {
        while uploads.join_next().await.is_some() {}
    };
    if tokio::time::timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS + 1), drain)
        .await
        .is_err()
    {
        warn!("Timed out waiting for uploads, exiting anyway");
    }
}
