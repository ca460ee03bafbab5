// SPDX-License-Identifier: GPL-3.0-only

//! Image file source
//!
//! Loads image files as RGBA frames and plays them back in a loop at the
//! image streaming frame rate.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{
    BackendError, BackendResult, CameraBackendType, CameraFormat, PixelFormat, RawFrame,
};
use crate::constants::{file_formats, virtual_camera as vc_timing};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Load an image file and convert it to a RawFrame
///
/// Supports common image formats: PNG, JPEG, GIF, BMP, WebP
pub fn load_image_as_frame(path: &Path) -> BackendResult<RawFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !file_formats::is_image_extension(&extension) {
        return Err(BackendError::FormatNotSupported(format!(
            "Unsupported file format: {}",
            path.display()
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    debug!(width, height, "Image loaded successfully");

    Ok(RawFrame::rgba(width, height, rgba.into_raw()))
}

/// Camera backend replaying a fixed set of frames
pub struct ImageFileBackend {
    frames: Vec<RawFrame>,
    sources: Vec<PathBuf>,
    cursor: usize,
    interval: Duration,
    next_due: Option<Instant>,
    open: bool,
}

impl ImageFileBackend {
    /// Decode every file in `paths` up front
    pub fn from_paths(paths: &[PathBuf]) -> BackendResult<Self> {
        let frames = paths
            .iter()
            .map(|p| load_image_as_frame(p))
            .collect::<BackendResult<Vec<_>>>()?;
        let mut backend = Self::from_frames(frames)?;
        backend.sources = paths.to_vec();
        Ok(backend)
    }

    /// Replay already decoded frames
    pub fn from_frames(frames: Vec<RawFrame>) -> BackendResult<Self> {
        if frames.is_empty() {
            return Err(BackendError::InitializationFailed(
                "No frames to replay".to_string(),
            ));
        }
        Ok(Self {
            frames,
            sources: Vec::new(),
            cursor: 0,
            interval: vc_timing::IMAGE_STREAM_FRAME_DURATION,
            next_due: None,
            open: false,
        })
    }

    /// Override the playback interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl CameraBackend for ImageFileBackend {
    fn open(&mut self) -> BackendResult<CameraFormat> {
        let first = self.frames.first().ok_or(BackendError::NotInitialized)?;
        let format = CameraFormat {
            width: first.width,
            height: first.height,
            pixel_format: PixelFormat::RGBA,
        };
        self.open = true;
        self.next_due = None;
        info!(frames = self.frames.len(), format = %format, "Image file source opened");
        Ok(format)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn next_frame(&mut self) -> BackendResult<Option<RawFrame>> {
        if !self.open {
            return Err(BackendError::NotInitialized);
        }

        let now = Instant::now();
        if let Some(due) = self.next_due
            && due > now
        {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(Instant::now() + self.interval);

        let mut frame = self.frames[self.cursor].clone();
        frame.captured_at = Instant::now();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(Some(frame))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::ImageFiles
    }

    fn describe(&self) -> String {
        if self.sources.is_empty() {
            format!("{} in-memory frame(s)", self.frames.len())
        } else {
            let names: Vec<String> = self
                .sources
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            format!("image files [{}]", names.join(", "))
        }
    }
}
