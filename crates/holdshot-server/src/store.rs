use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{info, warn};

use holdshot_shared::constants::ALL_USERS;
use holdshot_shared::{StoredImage, UserFilter};

use crate::error::ServerError;
use crate::sync::ChangeCounter;

/// File extensions exposed by listings. Anything else found in a user
/// directory (temp files, stray notes) is ignored.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Reject names that are not exactly one normal path component.
///
/// Anything else can address the storage root itself (`.` joins to the
/// root, so a delete on it would wipe every namespace) or escape it
/// (`..`, separators, Windows prefixes).
fn sanitize_component(value: &str) -> Result<(), ServerError> {
    if value.is_empty() {
        return Err(ServerError::BadRequest("Empty name".to_string()));
    }
    // A backslash separates paths on Windows but is an ordinary byte on
    // Unix; reject it on both so stored layouts stay portable.
    if value.contains('\\') {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == value => Ok(()),
        _ => Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        )),
    }
}

/// User names are path components and must not collide with the
/// list-everything sentinel.
fn sanitize_user(user: &str) -> Result<(), ServerError> {
    sanitize_component(user)?;
    if user == ALL_USERS {
        return Err(ServerError::BadRequest(format!(
            "Reserved user name: {}",
            ALL_USERS
        )));
    }
    Ok(())
}

/// Filesystem-backed screenshot store with one directory per user.
///
/// Every committed mutation bumps a catalog version counter so pollers
/// can ask "anything new since V?" without scanning the tree.
#[derive(Debug)]
pub struct ImageStore {
    root: PathBuf,
    version: ChangeCounter,
    seq: AtomicU64,
}

impl ImageStore {
    pub async fn new(root: PathBuf) -> Result<Self, ServerError> {
        fs::create_dir_all(&root).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create storage root '{}': {}",
                root.display(),
                e
            ))
        })?;

        info!(path = %root.display(), "Image store initialized");

        Ok(Self {
            root,
            version: ChangeCounter::new(),
            seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current catalog version. Bumped on every committed mutation.
    pub fn catalog_version(&self) -> u64 {
        self.version.current()
    }

    /// Whether the catalog has changed since `observed`.
    pub fn changed_since(&self, observed: u64) -> bool {
        self.version.has_changed_since(observed)
    }

    /// Build a unique stored name for an upload.
    ///
    /// The wall-clock prefix keeps plain descending string order equal
    /// to reverse chronological order; the zero-padded sequence number
    /// disambiguates uploads landing within the same microsecond.
    fn next_stored_name(&self, original: &str) -> String {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%6f");
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) % 1_000_000;
        format!("{}-{:06}_{}", stamp, seq, original)
    }

    /// Store one uploaded screenshot for `user`.
    ///
    /// The payload is written under a temp name and renamed into place,
    /// so listings and the static file route never observe a partial
    /// file. The catalog version is bumped only after the rename.
    pub async fn ingest(
        &self,
        user: &str,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredImage, ServerError> {
        if !content_type.starts_with("image/") {
            return Err(ServerError::InvalidContentType(content_type.to_string()));
        }
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty image upload".to_string()));
        }
        sanitize_user(user)?;
        sanitize_component(original_name)?;

        let user_dir = self.root.join(user);
        fs::create_dir_all(&user_dir).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create user directory '{}': {}",
                user_dir.display(),
                e
            ))
        })?;

        let name = self.next_stored_name(original_name);
        let final_path = user_dir.join(&name);
        let tmp_path = user_dir.join(format!("{}.tmp", name));

        if let Err(e) = fs::write(&tmp_path, data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServerError::Storage(format!(
                "Failed to write '{}': {}",
                name, e
            )));
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServerError::Storage(format!(
                "Failed to commit '{}': {}",
                name, e
            )));
        }

        let version = self.version.bump();

        let stored = StoredImage {
            user: user.to_string(),
            name,
            size_bytes: data.len() as u64,
            stored_at: Utc::now(),
        };

        info!(
            user = %user,
            name = %stored.name,
            size = data.len(),
            version,
            "Stored screenshot"
        );

        Ok(stored)
    }

    /// All user names that currently have a storage directory, sorted.
    pub async fn list_users(&self) -> Result<Vec<String>, ServerError> {
        let mut users = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // A missing root means nothing has been uploaded yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(users),
            Err(e) => {
                return Err(ServerError::Storage(format!("Failed to list users: {}", e)));
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                users.push(name.to_string());
            }
        }

        users.sort();
        Ok(users)
    }

    /// Images for one user or for everyone, newest first.
    ///
    /// An unknown or invalid user name yields an empty list rather than
    /// an error.
    pub async fn list_images(&self, filter: &UserFilter) -> Result<Vec<StoredImage>, ServerError> {
        let users = match filter {
            UserFilter::All => self.list_users().await?,
            UserFilter::User(name) => {
                if sanitize_user(name).is_err() {
                    return Ok(Vec::new());
                }
                vec![name.clone()]
            }
        };

        let mut images = Vec::new();
        for user in &users {
            self.collect_user_images(user, &mut images).await?;
        }

        images.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(images)
    }

    async fn collect_user_images(
        &self,
        user: &str,
        out: &mut Vec<StoredImage>,
    ) -> Result<(), ServerError> {
        let dir = self.root.join(user);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(ServerError::Storage(format!(
                    "Failed to list images for '{}': {}",
                    user, e
                )));
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !has_image_extension(&name) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if !meta.is_file() {
                continue;
            }
            let stored_at = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            out.push(StoredImage {
                user: user.to_string(),
                name,
                size_bytes: meta.len(),
                stored_at,
            });
        }

        Ok(())
    }

    /// Remove a user's entire directory. Returns whether anything was
    /// deleted; invalid and unknown names report `false` so callers can
    /// treat deletion as idempotent.
    pub async fn delete_user(&self, user: &str) -> bool {
        if sanitize_user(user).is_err() {
            return false;
        }
        let dir = self.root.join(user);
        if !dir.is_dir() {
            return false;
        }

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                let version = self.version.bump();
                info!(user = %user, version, "Deleted user images");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                // Files may be gone even when removal failed partway,
                // so pollers still need to see a version change.
                self.version.bump();
                warn!(user = %user, error = %e, "Failed to delete user images");
                false
            }
        }
    }
}
