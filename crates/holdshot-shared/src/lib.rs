// Types and constants shared between the holdshot client and server.

pub mod constants;
pub mod protocol;

pub use protocol::{
    DeleteResponse, ImageListResponse, StoredImage, UploadAck, UserFilter, UserListResponse,
    VersionResponse,
};
