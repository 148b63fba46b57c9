//! Client configuration with runtime-adjustable settings.
//!
//! All settings have defaults so the agent can start with zero
//! configuration against a local server.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::RwLock;
use tracing::warn;

use holdshot_shared::constants::{ALL_USERS, DEFAULT_HOLD_SECS, DEFAULT_HTTP_PORT};

use crate::error::ClientError;

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Account name uploads are filed under.
    /// Env: `UPLOAD_USER`
    /// Default: `default_user`
    pub username: String,

    /// Base URL of the upload server. Always ends with a slash so
    /// endpoint paths join underneath it.
    /// Env: `SERVER_URL`
    /// Default: `http://127.0.0.1:7880/`
    pub server_url: Url,

    /// How long the primary button must stay held to trigger a capture.
    /// Env: `HOLD_SECONDS` (positive real number)
    /// Default: 4 seconds
    pub hold_threshold: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "default_user".to_string(),
            server_url: format!("http://127.0.0.1:{}/", DEFAULT_HTTP_PORT)
                .parse()
                .expect("default server URL is valid"),
            hold_threshold: Duration::from_secs_f64(DEFAULT_HOLD_SECS),
        }
    }
}

fn parse_username(value: &str) -> Result<String, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Config("Username must not be empty".to_string()));
    }
    if trimmed == ALL_USERS {
        return Err(ClientError::Config(format!(
            "Username '{}' is reserved",
            ALL_USERS
        )));
    }
    Ok(trimmed.to_string())
}

fn parse_server_url(value: &str) -> Result<Url, ClientError> {
    // A trailing slash matters: Url::join would otherwise replace the
    // last path segment instead of appending to it.
    let trimmed = value.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    with_slash
        .parse()
        .map_err(|e| ClientError::Config(format!("Invalid server URL '{}': {}", trimmed, e)))
}

fn hold_duration(seconds: f64) -> Result<Duration, ClientError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ClientError::Config(format!(
            "Hold threshold must be a positive number of seconds, got {}",
            seconds
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn parse_hold_seconds(value: &str) -> Result<Duration, ClientError> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("Invalid hold seconds: '{}'", value)))?;
    hold_duration(seconds)
}

/// Shared, mutable view of the client configuration.
///
/// Reads take a snapshot; writers validate first and keep the previous
/// value when the new one is rejected. Changes apply from the next
/// gesture on.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    inner: Arc<RwLock<ClientConfig>>,
}

impl ConfigService {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Load configuration from environment variables, falling back to
    /// defaults. Invalid values are logged and the default is retained.
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();

        if let Ok(user) = std::env::var("UPLOAD_USER") {
            match parse_username(&user) {
                Ok(user) => config.username = user,
                Err(e) => warn!(error = %e, "Invalid UPLOAD_USER, using default"),
            }
        }
        if let Ok(url) = std::env::var("SERVER_URL") {
            match parse_server_url(&url) {
                Ok(url) => config.server_url = url,
                Err(e) => warn!(error = %e, "Invalid SERVER_URL, using default"),
            }
        }
        if let Ok(secs) = std::env::var("HOLD_SECONDS") {
            match parse_hold_seconds(&secs) {
                Ok(threshold) => config.hold_threshold = threshold,
                Err(e) => warn!(error = %e, "Invalid HOLD_SECONDS, using default"),
            }
        }

        Self::new(config)
    }

    pub async fn snapshot(&self) -> ClientConfig {
        self.inner.read().await.clone()
    }

    pub async fn hold_threshold(&self) -> Duration {
        self.inner.read().await.hold_threshold
    }

    pub async fn set_username(&self, username: &str) -> Result<(), ClientError> {
        let username = parse_username(username)?;
        self.inner.write().await.username = username;
        Ok(())
    }

    pub async fn set_server_url(&self, url: &str) -> Result<(), ClientError> {
        let url = parse_server_url(url)?;
        self.inner.write().await.server_url = url;
        Ok(())
    }

    pub async fn set_hold_seconds(&self, seconds: f64) -> Result<(), ClientError> {
        let threshold = hold_duration(seconds)?;
        self.inner.write().await.hold_threshold = threshold;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.username, "default_user");
        assert_eq!(config.server_url.as_str(), "http://127.0.0.1:7880/");
        assert_eq!(config.hold_threshold, Duration::from_secs(4));
    }

    #[test]
    fn test_username_validation() {
        assert_eq!(parse_username("  alice ").unwrap(), "alice");
        assert!(parse_username("").is_err());
        assert!(parse_username("   ").is_err());
        assert!(parse_username("*").is_err());
    }

    #[test]
    fn test_server_url_gets_trailing_slash() {
        let url = parse_server_url("http://example.com:7880/base").unwrap();
        assert_eq!(url.as_str(), "http://example.com:7880/base/");
        assert_eq!(
            url.join("api/upload").unwrap().as_str(),
            "http://example.com:7880/base/api/upload"
        );
    }

    #[test]
    fn test_hold_seconds_validation() {
        assert_eq!(parse_hold_seconds("2.5").unwrap(), Duration::from_millis(2500));
        assert!(parse_hold_seconds("0").is_err());
        assert!(parse_hold_seconds("-1").is_err());
        assert!(parse_hold_seconds("NaN").is_err());
        assert!(parse_hold_seconds("inf").is_err());
        assert!(parse_hold_seconds("soon").is_err());
    }

    #[tokio::test]
    async fn test_setters_keep_previous_on_invalid() {
        let service = ConfigService::default();

        service.set_hold_seconds(2.0).await.unwrap();
        assert!(service.set_hold_seconds(0.0).await.is_err());
        assert_eq!(service.hold_threshold().await, Duration::from_secs(2));

        service.set_username("bob").await.unwrap();
        assert!(service.set_username("*").await.is_err());
        assert_eq!(service.snapshot().await.username, "bob");
    }
}
