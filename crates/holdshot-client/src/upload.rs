//! Screenshot capture-and-upload pipeline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use holdshot_shared::constants::{SCREENSHOT_FILENAME, UPLOAD_TIMEOUT_SECS};
use holdshot_shared::UploadAck;

use crate::capture::{encode_png, CaptureBackend, CaptureError};
use crate::config::ConfigService;
use crate::error::ClientError;

/// Captures the primary display and ships the PNG to the server.
///
/// Cloning is cheap; all clones share the HTTP connection pool and the
/// configuration, so each upload sees the settings current at send time.
#[derive(Clone)]
pub struct Uploader {
    http: reqwest::Client,
    config: ConfigService,
    capture: Arc<dyn CaptureBackend>,
}

impl Uploader {
    pub fn new(config: ConfigService, capture: Arc<dyn CaptureBackend>) -> Result<Self, ClientError> {
        Self::with_timeout(config, capture, Duration::from_secs(UPLOAD_TIMEOUT_SECS))
    }

    /// Like [`Uploader::new`] with a caller-chosen transport timeout.
    /// The timeout covers the whole request, connect through response.
    pub fn with_timeout(
        config: ConfigService,
        capture: Arc<dyn CaptureBackend>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            config,
            capture,
        })
    }

    /// Capture one frame, encode it as PNG, and upload it.
    ///
    /// `held` is the hold duration that triggered the capture; it is
    /// recorded in logs only. The server assigns the stored name.
    pub async fn capture_and_send(&self, held: Duration) -> Result<UploadAck, ClientError> {
        let config = self.config.snapshot().await;
        let captured_at = chrono::Utc::now();

        // Capture and encoding can take hundreds of milliseconds on
        // large displays; keep them off the async runtime.
        let backend = self.capture.clone();
        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ClientError> {
            let frame = backend.capture()?;
            Ok(encode_png(frame)?)
        })
        .await
        .map_err(|e| {
            ClientError::Capture(CaptureError::CaptureFailed(format!(
                "capture task failed: {}",
                e
            )))
        })??;

        debug!(
            user = %config.username,
            bytes = png.len(),
            held_ms = held.as_millis() as u64,
            "Uploading screenshot"
        );

        let part = Part::bytes(png)
            .file_name(SCREENSHOT_FILENAME)
            .mime_str("image/png")?;
        let form = Form::new()
            .text("username", config.username.clone())
            .text("timestamp", captured_at.to_rfc3339())
            .part("image", part);

        let url = config
            .server_url
            .join("api/upload")
            .map_err(|e| ClientError::Config(format!("Invalid upload URL: {}", e)))?;

        let response = self.http.post(url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, detail });
        }

        let ack: UploadAck = response.json().await?;
        info!(
            user = %config.username,
            path = %ack.server_path,
            "Screenshot uploaded"
        );
        Ok(ack)
    }
}
