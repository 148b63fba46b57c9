use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ALL_USERS;

/// Acknowledgement returned by `POST /api/upload` on success (HTTP 201).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAck {
    /// Human-readable confirmation.
    pub message: String,
    /// Server-side path of the stored file, rooted at the storage directory.
    pub server_path: String,
}

/// One stored screenshot as reported by the catalog.
///
/// `name` is timestamp-prefixed, so sorting names descending yields
/// newest-first. Viewers rely on that ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    /// Owning user (namespace directory name).
    pub user: String,
    /// Stored file name, `<timestamp-token>_<original-filename>`.
    pub name: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// When the server stored the file.
    pub stored_at: DateTime<Utc>,
}

/// Body of `GET /api/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    /// The "all users" sentinel, delivered so viewers can offer it alongside
    /// the real identifiers.
    pub all_users: String,
    /// Sorted user identifiers.
    pub users: Vec<String>,
}

/// Body of `GET /api/images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListResponse {
    pub images: Vec<StoredImage>,
}

/// Body of `POST /api/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Body of `GET /api/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    /// Opaque monotonically increasing change version.
    pub version: u64,
    /// Present only when the request carried `?since=`: whether the catalog
    /// changed after that observation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

/// Catalog query scope: one user's namespace or every namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    All,
    User(String),
}

impl UserFilter {
    /// Interpret an optional `user` query parameter.
    ///
    /// An absent parameter and the sentinel both mean "all users"; anything
    /// else names a single namespace.
    pub fn from_query(user: Option<&str>) -> Self {
        match user {
            None => UserFilter::All,
            Some(u) if u == ALL_USERS => UserFilter::All,
            Some(u) => UserFilter::User(u.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserFilter::All => ALL_USERS,
            UserFilter::User(u) => u,
        }
    }
}

impl std::fmt::Display for UserFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
