use thiserror::Error;

use crate::capture::CaptureError;

/// Errors produced by the holdshot client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Upload transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server rejected upload ({status}): {detail}")]
    Rejected {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pointer hook error: {0}")]
    Hook(String),
}
