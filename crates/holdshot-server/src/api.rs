use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use holdshot_shared::constants::{ALL_USERS, SCREENSHOT_FILENAME};
use holdshot_shared::{
    DeleteResponse, ImageListResponse, UploadAck, UserFilter, UserListResponse, VersionResponse,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::store::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ImageStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    // Stored screenshots are plain files; let the gallery fetch them
    // directly from the storage root.
    let files = ServeDir::new(state.store.root());

    Router::new()
        .route("/health", get(health_check))
        .route("/api/upload", post(upload_image))
        .route("/api/users", get(list_users))
        .route("/api/images", get(list_images))
        .route("/api/delete", post(delete_images))
        .route("/api/version", get(catalog_version))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ImagesQuery {
    user: Option<String>,
}

#[derive(Deserialize)]
struct DeleteQuery {
    user: String,
}

#[derive(Deserialize)]
struct VersionQuery {
    since: Option<u64>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept one screenshot upload: `username` and `timestamp` text fields
/// plus an `image` file part whose content type must be `image/*`. All
/// three fields are required.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAck>), ServerError> {
    let mut username: Option<String> = None;
    let mut client_timestamp: Option<String> = None;
    let mut image: Option<(String, String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "username" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                username = Some(value);
            }
            "timestamp" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                client_timestamp = Some(value);
            }
            "image" => {
                let filename = field
                    .file_name()
                    .unwrap_or(SCREENSHOT_FILENAME)
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                image = Some((filename, content_type, data));
            }
            other => {
                debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let username = username.ok_or_else(|| {
        ServerError::BadRequest("Missing 'username' field in multipart form".to_string())
    })?;
    let (filename, content_type, data) = image.ok_or_else(|| {
        ServerError::BadRequest("Missing 'image' field in multipart form".to_string())
    })?;
    let timestamp = client_timestamp.ok_or_else(|| {
        ServerError::BadRequest("Missing 'timestamp' field in multipart form".to_string())
    })?;

    // The capture timestamp is informational; stored names always use
    // the server clock so ordering stays consistent across clients.
    debug!(user = %username, captured_at = %timestamp, "Upload request");

    let stored = state
        .store
        .ingest(&username, &filename, &content_type, &data)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadAck {
            message: "Screenshot uploaded successfully".to_string(),
            server_path: format!("{}/{}", stored.user, stored.name),
        }),
    ))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, ServerError> {
    let users = state.store.list_users().await?;
    Ok(Json(UserListResponse {
        all_users: ALL_USERS.to_string(),
        users,
    }))
}

async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ImagesQuery>,
) -> Result<Json<ImageListResponse>, ServerError> {
    let filter = UserFilter::from_query(query.user.as_deref());
    let images = state.store.list_images(&filter).await?;
    Ok(Json(ImageListResponse { images }))
}

/// Delete every stored image of one user. Always answers 200; the body
/// says whether anything was actually removed.
async fn delete_images(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Json<DeleteResponse> {
    let deleted = state.store.delete_user(&query.user).await;
    Json(DeleteResponse { deleted })
}

async fn catalog_version(
    State(state): State<AppState>,
    Query(query): Query<VersionQuery>,
) -> Json<VersionResponse> {
    let version = state.store.catalog_version();
    let changed = query.since.map(|observed| state.store.changed_since(observed));
    Json(VersionResponse { version, changed })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "holdshot-test-boundary";

    async fn test_app() -> (Router, Arc<ImageStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ImageStore::new(dir.path().join("uploads")).await.unwrap());
        let state = AppState {
            store: store.clone(),
            config: Arc::new(ServerConfig::default()),
        };
        (build_router(state), store, dir)
    }

    fn upload_request(user: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"username\"\r\n\r\n");
        body.extend_from_slice(user.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"timestamp\"\r\n\r\n");
        body.extend_from_slice(b"2024-05-01T10:00:00Z\r\n");
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"screenshot.png\"\r\n",
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(res: axum::response::Response) -> T {
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _store, _dir) = test_app().await;

        let res = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_stores_and_acks() {
        let (app, store, _dir) = test_app().await;

        let res = app
            .oneshot(upload_request("alice", "image/png", b"fake-png"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let ack: UploadAck = json_body(res).await;
        assert!(ack.server_path.starts_with("alice/"));
        assert!(ack.server_path.ends_with("_screenshot.png"));
        assert_eq!(store.catalog_version(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_content_type() {
        let (app, store, _dir) = test_app().await;

        let res = app
            .oneshot(upload_request("alice", "text/plain", b"oops"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let err: serde_json::Value = json_body(res).await;
        assert!(err["error"]
            .as_str()
            .unwrap()
            .contains("Invalid content type"));
        assert_eq!(store.catalog_version(), 0);
    }

    #[tokio::test]
    async fn test_upload_requires_image_field() {
        let (app, _store, _dir) = test_app().await;

        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"username\"\r\n\r\nalice\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let res = app.oneshot(request).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let err: serde_json::Value = json_body(res).await;
        assert!(err["error"].as_str().unwrap().contains("image"));
    }

    #[tokio::test]
    async fn test_upload_requires_timestamp_field() {
        let (app, store, _dir) = test_app().await;

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"username\"\r\n\r\n");
        body.extend_from_slice(b"alice\r\n");
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"screenshot.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\nfake-png");
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let res = app.oneshot(request).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let err: serde_json::Value = json_body(res).await;
        assert!(err["error"].as_str().unwrap().contains("timestamp"));
        assert_eq!(store.catalog_version(), 0);
    }

    #[tokio::test]
    async fn test_list_users_and_images() {
        let (app, _store, _dir) = test_app().await;

        app.clone()
            .oneshot(upload_request("bob", "image/png", b"one"))
            .await
            .unwrap();
        app.clone()
            .oneshot(upload_request("alice", "image/png", b"two"))
            .await
            .unwrap();

        let res = app.clone().oneshot(get_request("/api/users")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let users: UserListResponse = json_body(res).await;
        assert_eq!(users.all_users, "*");
        assert_eq!(users.users, ["alice", "bob"]);

        let res = app
            .clone()
            .oneshot(get_request("/api/images?user=bob"))
            .await
            .unwrap();
        let images: ImageListResponse = json_body(res).await;
        assert_eq!(images.images.len(), 1);
        assert_eq!(images.images[0].user, "bob");

        let res = app.clone().oneshot(get_request("/api/images")).await.unwrap();
        let images: ImageListResponse = json_body(res).await;
        assert_eq!(images.images.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_endpoint() {
        let (app, store, _dir) = test_app().await;

        app.clone()
            .oneshot(upload_request("carl", "image/png", b"x"))
            .await
            .unwrap();

        let delete = |app: Router, uri: &'static str| async move {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            app.oneshot(request).await.unwrap()
        };

        // A dot user aliases the storage root; it must be refused without
        // touching anyone's namespace.
        let res = delete(app.clone(), "/api/delete?user=.").await;
        assert_eq!(res.status(), StatusCode::OK);
        let del: DeleteResponse = json_body(res).await;
        assert!(!del.deleted);
        assert_eq!(store.list_users().await.unwrap(), ["carl"]);

        let res = delete(app.clone(), "/api/delete?user=carl").await;
        assert_eq!(res.status(), StatusCode::OK);
        let del: DeleteResponse = json_body(res).await;
        assert!(del.deleted);

        // Idempotent: a second call reports nothing left to delete.
        let res = delete(app.clone(), "/api/delete?user=carl").await;
        assert_eq!(res.status(), StatusCode::OK);
        let del: DeleteResponse = json_body(res).await;
        assert!(!del.deleted);
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let (app, _store, _dir) = test_app().await;

        let res = app.clone().oneshot(get_request("/api/version")).await.unwrap();
        let v: VersionResponse = json_body(res).await;
        assert_eq!(v.version, 0);
        assert!(v.changed.is_none());

        app.clone()
            .oneshot(upload_request("dana", "image/png", b"x"))
            .await
            .unwrap();

        let res = app
            .clone()
            .oneshot(get_request("/api/version?since=0"))
            .await
            .unwrap();
        let v: VersionResponse = json_body(res).await;
        assert_eq!(v.version, 1);
        assert_eq!(v.changed, Some(true));

        let res = app
            .clone()
            .oneshot(get_request("/api/version?since=1"))
            .await
            .unwrap();
        let v: VersionResponse = json_body(res).await;
        assert_eq!(v.changed, Some(false));
    }

    #[tokio::test]
    async fn test_files_route_serves_uploads() {
        let (app, store, _dir) = test_app().await;

        app.clone()
            .oneshot(upload_request("ella", "image/png", b"png-bytes"))
            .await
            .unwrap();

        let images = store.list_images(&UserFilter::All).await.unwrap();
        let uri = format!("/files/ella/{}", images[0].name);

        let res = app.clone().oneshot(get_request(&uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"png-bytes");
    }

    #[tokio::test]
    async fn test_client_upload_end_to_end() {
        let (app, store, _dir) = test_app().await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = holdshot_client::config::ClientConfig {
            username: "e2e".to_string(),
            server_url: format!("http://{}/", addr).parse().unwrap(),
            hold_threshold: std::time::Duration::from_millis(10),
        };
        let uploader = holdshot_client::upload::Uploader::new(
            holdshot_client::config::ConfigService::new(config),
            Arc::new(holdshot_client::capture::SyntheticCapture::default()),
        )
        .unwrap();

        let ack = uploader
            .capture_and_send(std::time::Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ack.server_path.starts_with("e2e/"));

        let images = store.list_images(&UserFilter::All).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].user, "e2e");

        // The synthetic backend produced a real PNG and it survived the trip.
        let bytes = tokio::fs::read(store.root().join("e2e").join(&images[0].name))
            .await
            .unwrap();
        image::load_from_memory(&bytes).unwrap();

        // Batch delete empties the namespace and advances the version.
        let before_delete = store.catalog_version();
        assert!(store.delete_user("e2e").await);
        assert!(store.catalog_version() > before_delete);
        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store
            .list_images(&UserFilter::User("e2e".to_string()))
            .await
            .unwrap()
            .is_empty());
    }
}
