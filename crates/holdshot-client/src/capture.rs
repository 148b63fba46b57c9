//! Screen capture backends.
//!
//! The real backend grabs the primary display through the OS capture
//! API; the synthetic backend produces deterministic frames so the rest
//! of the pipeline can be exercised in tests and on headless machines.

use std::io::Cursor;
use std::sync::Mutex;

use thiserror::Error;

/// Raw RGBA pixels of one captured display frame.
///
/// `rgba` is tightly packed, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to enumerate displays: {0}")]
    Enumeration(String),

    #[error("No primary display found")]
    NoPrimaryDisplay,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Screen capture is not supported on this platform")]
    Unsupported,
}

/// A source of screen frames.
///
/// Capture may block for a noticeable time on large displays, so
/// callers run it off the async runtime.
pub trait CaptureBackend: Send + Sync {
    fn capture(&self) -> Result<CapturedFrame, CaptureError>;
}

/// Captures the primary display.
///
/// Display handles are reacquired on every call, so monitors plugged or
/// unplugged between gestures do not invalidate the backend.
#[derive(Debug, Default)]
pub struct PrimaryDisplayCapture;

impl PrimaryDisplayCapture {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for PrimaryDisplayCapture {
    #[cfg(windows)]
    fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        use xcap::Monitor;

        let monitors =
            Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;

        let primary = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| {
                // If no monitor reports as primary, fall back to the first one.
                let all = Monitor::all().ok()?;
                all.into_iter().next()
            })
            .ok_or(CaptureError::NoPrimaryDisplay)?;

        let image = primary
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let width = image.width();
        let height = image.height();
        Ok(CapturedFrame {
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    #[cfg(not(windows))]
    fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

/// Deterministic backend for tests and headless development.
///
/// Frames carry a coordinate gradient plus a per-capture shade, so
/// consecutive captures are distinguishable.
#[derive(Debug)]
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    sequence: Mutex<u64>,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: Mutex::new(0),
        }
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new(64, 64)
    }
}

impl CaptureBackend for SyntheticCapture {
    fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        let mut sequence = self
            .sequence
            .lock()
            .map_err(|_| CaptureError::CaptureFailed("sequence lock poisoned".to_string()))?;
        *sequence += 1;
        let shade = (*sequence % 255) as u8;

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                rgba.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, shade, 255]);
            }
        }

        Ok(CapturedFrame {
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}

/// Encode a frame as PNG, the wire format every upload uses.
pub fn encode_png(frame: CapturedFrame) -> Result<Vec<u8>, image::ImageError> {
    let buffer = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba)
        .ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;

    let mut png = Cursor::new(Vec::new());
    buffer.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}
