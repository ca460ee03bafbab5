// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends and the frames they produce

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture device (e.g. /dev/video0)
    #[default]
    V4l2,
    /// Still image files replayed as a live feed
    ImageFiles,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::ImageFiles => write!(f, "image files"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the device.
/// This is common on phones where sensors are rotated 90° or 270° relative
/// to the display orientation. Analyzers receive it as frame metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// Motion JPEG - every frame is a complete JPEG bitstream
    MJPEG,
}

impl PixelFormat {
    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"RGB4" | b"AB24" => Some(Self::RGBA),
            b"RGB3" => Some(Self::RGB24),
            b"GREY" => Some(Self::Gray8),
            b"YUYV" => Some(Self::YUYV),
            b"NV12" => Some(Self::NV12),
            b"MJPG" | b"JPEG" => Some(Self::MJPEG),
            _ => None,
        }
    }

    /// FourCC code used when negotiating this format with a V4L2 device
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            Self::RGBA => b"AB24",
            Self::RGB24 => b"RGB3",
            Self::Gray8 => b"GREY",
            Self::YUYV => b"YUYV",
            Self::NV12 => b"NV12",
            Self::MJPEG => b"MJPG",
        }
    }

    /// Bytes per pixel of the first plane, `None` for compressed formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Self::RGBA => Some(4),
            Self::RGB24 => Some(3),
            Self::YUYV => Some(2),
            Self::Gray8 | Self::NV12 => Some(1),
            Self::MJPEG => None,
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} {:?}",
            self.width, self.height, self.pixel_format
        )
    }
}

/// Unleased frame as produced by a backend
///
/// Backends hand these to the frame source, which numbers them and wraps
/// them into leased [`Frame`]s before any consumer sees them.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride of the first plane in bytes (0 for compressed formats)
    pub stride: u32,
    pub format: PixelFormat,
    pub rotation: SensorRotation,
    pub data: Arc<[u8]>,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl RawFrame {
    /// Build a tightly packed RGBA frame
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * 4,
            format: PixelFormat::RGBA,
            rotation: SensorRotation::None,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }
}

/// Counts leased live frames so leaks and double releases are observable
#[derive(Debug, Default)]
pub struct FrameLedger {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl FrameLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a newly acquired frame and hand out its lease
    pub fn acquire(self: &Arc<Self>) -> FrameLease {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        FrameLease {
            ledger: Arc::clone(self),
        }
    }

    /// Total frames acquired so far
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Total frames released so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Frames acquired but not yet released
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// Release token for one frame. Consumed on release, so it can fire only once.
#[derive(Debug)]
pub struct FrameLease {
    ledger: Arc<FrameLedger>,
}

impl FrameLease {
    fn release(self, sequence: u64) {
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
        trace!(sequence, "Frame released");
    }
}

/// A single live frame from the camera
///
/// Frames are owned by exactly one consumer at a time and are not `Clone`.
/// The underlying resource is released when the frame is dropped, on every
/// exit path (analysis finished, superseded, dropped, task cancelled).
#[derive(Debug)]
pub struct Frame {
    /// Monotonically increasing sequence number assigned by the frame source
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Row stride of the first plane in bytes (0 for compressed formats)
    pub stride: u32,
    pub format: PixelFormat,
    pub rotation: SensorRotation,
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
    lease: Option<FrameLease>,
}

impl Frame {
    /// Wrap a backend frame, registering it with `ledger`
    pub fn leased(raw: RawFrame, sequence: u64, ledger: &Arc<FrameLedger>) -> Self {
        let mut frame = Self::detached(raw, sequence);
        frame.lease = Some(ledger.acquire());
        frame
    }

    /// Wrap a frame that is not accounted anywhere (file decoding, tests)
    pub fn detached(raw: RawFrame, sequence: u64) -> Self {
        Self {
            sequence,
            width: raw.width,
            height: raw.height,
            stride: raw.stride,
            format: raw.format,
            rotation: raw.rotation,
            data: raw.data,
            captured_at: raw.captured_at,
            lease: None,
        }
    }

    /// Whether this frame still holds a lease
    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            lease.release(self.sequence);
        }
    }
}

/// Receives live frames from a bound frame source
///
/// Implementations take ownership of each offered frame. Whatever they do
/// with it, dropping it releases it.
pub trait FrameSink: Send + Sync {
    fn offer(&self, frame: Frame);
}

/// Lightweight snapshot of the most recent frame for on-screen display
///
/// Shares pixel memory with the live frame but carries no lease.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub rotation: SensorRotation,
    pub data: Arc<[u8]>,
}

impl PreviewFrame {
    pub fn from_raw(raw: &RawFrame, sequence: u64) -> Self {
        Self {
            sequence,
            width: raw.width,
            height: raw.height,
            stride: raw.stride,
            format: raw.format,
            rotation: raw.rotation,
            data: Arc::clone(&raw.data),
        }
    }
}

/// Live preview target returned when a frame source is bound
#[derive(Debug, Clone)]
pub struct PreviewSurface {
    format: CameraFormat,
    frames: tokio::sync::watch::Receiver<Option<PreviewFrame>>,
}

impl PreviewSurface {
    pub fn new(
        format: CameraFormat,
        frames: tokio::sync::watch::Receiver<Option<PreviewFrame>>,
    ) -> Self {
        Self { format, frames }
    }

    /// Format negotiated with the camera
    pub fn format(&self) -> CameraFormat {
        self.format
    }

    /// Most recent preview frame, if any arrived yet
    pub fn latest(&self) -> Option<PreviewFrame> {
        self.frames.borrow().clone()
    }

    /// Wait for the next preview frame. Returns `false` once the source is unbound.
    pub async fn changed(&mut self) -> bool {
        self.frames.changed().await.is_ok()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Operation needs an open device
    NotInitialized,
    /// Device went away while streaming
    Disconnected(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NotInitialized => write!(f, "Camera is not open"),
            BackendError::Disconnected(msg) => write!(f, "Camera disconnected: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
