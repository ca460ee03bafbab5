// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    Scan pipeline    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │     FrameSource     │  ← Binding, capture thread, frame leases
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌──────────┐
//!   │ V4L2 │  │  Images  │
//!   └──────┘  └──────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod source;
pub mod types;
pub mod v4l2;

pub use source::FrameSource;
pub use types::*;

use crate::backends::virtual_camera::ImageFileBackend;
use crate::config::Config;
use std::path::PathBuf;

/// Blocking camera device interface
///
/// Backends are driven from the capture thread, so every call may block for
/// up to one frame interval. Implementations only need to be `Send`; the
/// frame source serializes access.
pub trait CameraBackend: Send {
    /// Open the device and start streaming, returning the negotiated format
    fn open(&mut self) -> BackendResult<CameraFormat>;

    /// Stop streaming and release the device
    fn close(&mut self);

    /// Check if the device is open
    fn is_open(&self) -> bool;

    /// Wait for the next live frame
    ///
    /// Returns `Ok(None)` when no frame arrived within the backend's poll
    /// interval, which lets the capture thread notice stop requests.
    fn next_frame(&mut self) -> BackendResult<Option<RawFrame>>;

    /// Grab one still image
    ///
    /// Defaults to the next live frame. Backends with a dedicated still path
    /// override this.
    fn capture_still(&mut self) -> BackendResult<RawFrame> {
        for _ in 0..crate::constants::timing::STILL_CAPTURE_ATTEMPTS {
            if let Some(frame) = self.next_frame()? {
                return Ok(frame);
            }
        }
        Err(BackendError::Other(
            "No frame available for still capture".to_string(),
        ))
    }

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Human readable description of the device, for logs
    fn describe(&self) -> String;
}

/// Create the backend selected by `config`
///
/// When `images` is non-empty the image file backend is used regardless of
/// the configured type.
pub fn get_backend(config: &Config, images: &[PathBuf]) -> BackendResult<Box<dyn CameraBackend>> {
    if !images.is_empty() {
        return Ok(Box::new(ImageFileBackend::from_paths(images)?));
    }

    match config.backend {
        CameraBackendType::V4l2 => Ok(Box::new(v4l2::V4l2Backend::new(
            config.device_path.clone(),
            config.preferred_format.as_deref(),
        ))),
        CameraBackendType::ImageFiles => Err(BackendError::NotAvailable(
            "image file backend selected but no image files were given".to_string(),
        )),
    }
}

/// Get the default backend type
pub fn get_default_backend() -> CameraBackendType {
    CameraBackendType::V4l2
}
