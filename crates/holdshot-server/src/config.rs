//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local use.

use std::net::SocketAddr;
use std::path::PathBuf;

use holdshot_shared::constants::{DEFAULT_HTTP_PORT, MAX_UPLOAD_BYTES};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:7880`
    pub http_addr: SocketAddr,

    /// Root directory where uploaded screenshots are stored, one
    /// subdirectory per user.
    /// Env: `STORAGE_ROOT`
    /// Default: `./uploads`
    pub storage_root: PathBuf,

    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            storage_root: PathBuf::from("./uploads"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Invalid values are logged and the default is retained.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("STORAGE_ROOT") {
            config.storage_root = PathBuf::from(path);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
