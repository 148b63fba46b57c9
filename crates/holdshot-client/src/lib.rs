//! Client-side library for the holdshot agent: pointer gesture
//! detection, screen capture, and screenshot upload.

pub mod capture;
pub mod config;
pub mod error;
pub mod gesture;
pub mod hook;
pub mod upload;

pub use config::{ClientConfig, ConfigService};
pub use error::ClientError;
pub use gesture::{GestureDetector, PointerEvent, Trigger};
pub use upload::Uploader;
