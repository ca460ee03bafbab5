// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(BackendError),
    /// Pipeline errors
    Pipeline(PipelineError),
    /// Barcode decoding errors
    Decode(DecodeError),
    /// Text recognition errors
    Recognition(RecognitionError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Still capture errors
///
/// Reported to the capture-error callback with their display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Capture requested before the frame source was bound
    NotBound,
    /// Camera failed to deliver a still frame
    Device(String),
    /// Frame could not be encoded
    Encoding(String),
    /// Encoded image could not be written durably
    Storage(String),
}

/// Text recognition errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Stored image is missing or unreadable
    ImageUnavailable(String),
    /// Recognition engine reported a failure
    Engine(String),
    /// Recognition engine did not finish in time
    Timeout(Duration),
}

/// Barcode decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame could not be converted for scanning
    UnsupportedFrame(String),
    /// Symbols were located but none could be decoded
    Undecodable(String),
    /// Scanner worker did not complete
    Aborted(String),
}

/// Pipeline errors
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Operation requires a bound pipeline
    NotBound,
    /// Host lifecycle already ended
    LifecycleEnded,
    /// Camera could not be bound
    Camera(BackendError),
    /// Still capture failed
    Capture(CaptureError),
    /// Text recognition failed
    Recognition(RecognitionError),
}

impl RecognitionError {
    /// Raw diagnostic of the underlying failure, without any prefix
    pub fn diagnostic(&self) -> String {
        match self {
            RecognitionError::ImageUnavailable(msg) | RecognitionError::Engine(msg) => msg.clone(),
            RecognitionError::Timeout(after) => {
                format!("recognition timed out after {}s", after.as_secs())
            }
        }
    }
}

impl PipelineError {
    /// Message delivered to the capture-error callback
    ///
    /// Recognition failures carry the engine diagnostic unchanged; everything
    /// else uses the display text.
    pub fn callback_message(&self) -> String {
        match self {
            PipelineError::Recognition(e) => e.diagnostic(),
            PipelineError::Capture(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Decode(e) => write!(f, "Barcode error: {}", e),
            AppError::Recognition(e) => write!(f, "Recognition error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotBound => write!(f, "Camera is not bound"),
            CaptureError::Device(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::Encoding(msg) => write!(f, "Encoding failed: {}", msg),
            CaptureError::Storage(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionError::ImageUnavailable(msg) => write!(f, "Image unavailable: {}", msg),
            RecognitionError::Engine(msg) => write!(f, "Recognition failed: {}", msg),
            RecognitionError::Timeout(after) => {
                write!(f, "Recognition timed out after {}s", after.as_secs())
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedFrame(msg) => write!(f, "Unsupported frame: {}", msg),
            DecodeError::Undecodable(msg) => write!(f, "Undecodable symbol: {}", msg),
            DecodeError::Aborted(msg) => write!(f, "Scan aborted: {}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NotBound => write!(f, "Pipeline is not bound"),
            PipelineError::LifecycleEnded => write!(f, "Host lifecycle has ended"),
            PipelineError::Camera(e) => write!(f, "{}", e),
            PipelineError::Capture(e) => write!(f, "{}", e),
            PipelineError::Recognition(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecognitionError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for PipelineError {}

// Conversions from sub-errors to AppError
impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<RecognitionError> for AppError {
    fn from(err: RecognitionError) -> Self {
        AppError::Recognition(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Pipeline(PipelineError::Capture(err))
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::Camera(err)
    }
}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::NotBound => PipelineError::NotBound,
            other => PipelineError::Capture(other),
        }
    }
}

impl From<RecognitionError> for PipelineError {
    fn from(err: RecognitionError) -> Self {
        PipelineError::Recognition(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Lock a mutex, taking over the data if a previous holder panicked
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_diagnostic_is_unprefixed() {
        let err = RecognitionError::Engine("Failed to load language 'kor'".into());
        assert_eq!(err.diagnostic(), "Failed to load language 'kor'");
        assert_eq!(
            PipelineError::from(err).callback_message(),
            "Failed to load language 'kor'"
        );
    }

    #[test]
    fn test_capture_errors_use_display_text() {
        let err = PipelineError::from(CaptureError::Storage("disk full".into()));
        assert_eq!(err.callback_message(), "Save failed: disk full");
    }

    #[test]
    fn test_not_bound_capture_maps_to_pipeline_not_bound() {
        assert!(matches!(
            PipelineError::from(CaptureError::NotBound),
            PipelineError::NotBound
        ));
    }
}
