// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Frame loop timing
pub mod timing {
    use super::Duration;

    /// Log a frame summary every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Longest a backend may block waiting for one frame
    pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Poll intervals a still capture waits for a live frame
    pub const STILL_CAPTURE_ATTEMPTS: u32 = 20;
}

/// Barcode scanning defaults
pub mod barcode {
    /// Message delivered to the barcode-error callback
    pub const DEFAULT_FAILURE_MESSAGE: &str = "Barcode scan failed.";

    /// Frames are downscaled so their longest side is at most this many pixels
    pub const DEFAULT_MAX_DIMENSION: u32 = 640;
}

/// Text recognition defaults
pub mod ocr {
    /// Tesseract executable looked up on PATH
    pub const DEFAULT_TESSERACT: &str = "tesseract";

    /// Korean first, Latin script as a fallback
    pub const DEFAULT_LANGUAGES: &str = "kor+eng";

    /// Recognition timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

/// Supported file formats
pub mod file_formats {
    /// Image extensions the image file source can load
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if an extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Image file source timing
pub mod virtual_camera {
    use super::Duration;

    /// Frame rate for image streaming (~30fps)
    pub const IMAGE_STREAM_FRAME_DURATION: Duration = Duration::from_millis(33);
}

/// Application information utilities
pub mod app_info {
    /// Directory name used under the config and data directories
    pub const APP_DIR: &str = "card-scanner";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
