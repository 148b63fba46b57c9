/// Sentinel user filter meaning "every user's images".
///
/// Reserved: ingest rejects it as a username so it can never collide with a
/// real namespace.
pub const ALL_USERS: &str = "*";

/// Default HTTP port of the ingest/catalog server.
pub const DEFAULT_HTTP_PORT: u16 = 7880;

/// Default hold duration (seconds) that turns a press into a trigger.
pub const DEFAULT_HOLD_SECS: f64 = 4.0;

/// Ceiling on a single upload attempt, connect through response body.
/// Uploads run unattended in the background; a stuck call must self-release.
pub const UPLOAD_TIMEOUT_SECS: u64 = 15;

/// Maximum accepted upload body size in bytes (50 MiB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Canonical file name the client gives every captured screenshot.
pub const SCREENSHOT_FILENAME: &str = "screenshot.png";
