// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Uses the v4l crate to stream memory-mapped buffers from a `/dev/video*`
//! node. Formats the converters understand are negotiated in order of
//! preference; the first one the driver accepts wins.

use super::types::*;
use super::CameraBackend;
use crate::constants::timing;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Formats tried when no preference is configured
const FORMAT_PREFERENCE: [PixelFormat; 4] = [
    PixelFormat::YUYV,
    PixelFormat::MJPEG,
    PixelFormat::Gray8,
    PixelFormat::RGB24,
];

/// Number of memory-mapped buffers requested from the driver
const BUFFER_COUNT: u32 = 4;

/// errno reported by the driver once the device is unplugged
const ENODEV: i32 = 19;

struct OpenDevice {
    stream: MmapStream<'static>,
    format: CameraFormat,
    stride: u32,
    // Keeps the device handle alive for the stream's lifetime
    _device: Device,
}

/// V4L2 camera backend
pub struct V4l2Backend {
    device_path: String,
    preferred: Option<PixelFormat>,
    rotation: SensorRotation,
    open: Option<OpenDevice>,
}

impl V4l2Backend {
    /// Create a backend for `device_path`
    ///
    /// `preferred_fourcc` is tried before the built-in preference list.
    /// Unknown codes are ignored with a warning.
    pub fn new(device_path: impl Into<String>, preferred_fourcc: Option<&str>) -> Self {
        let preferred = preferred_fourcc.and_then(|code| {
            let parsed = <[u8; 4]>::try_from(code.as_bytes())
                .ok()
                .and_then(|bytes| PixelFormat::from_fourcc(&bytes));
            if parsed.is_none() {
                warn!(fourcc = code, "Ignoring unsupported preferred pixel format");
            }
            parsed
        });

        Self {
            device_path: device_path.into(),
            preferred,
            rotation: SensorRotation::None,
            open: None,
        }
    }

    /// Set the mounting rotation reported with every frame
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    fn candidates(&self) -> Vec<PixelFormat> {
        let mut list: Vec<PixelFormat> = self.preferred.into_iter().collect();
        list.extend(
            FORMAT_PREFERENCE
                .iter()
                .copied()
                .filter(|f| Some(*f) != self.preferred),
        );
        list
    }

    fn negotiate(&self, dev: &Device) -> BackendResult<(CameraFormat, u32)> {
        let current = dev
            .format()
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to get format: {}", e)))?;

        for candidate in self.candidates() {
            let mut wanted = current.clone();
            wanted.fourcc = v4l::FourCC::new(candidate.fourcc());

            match dev.set_format(&wanted) {
                Ok(applied) if PixelFormat::from_fourcc(&applied.fourcc.repr) == Some(candidate) => {
                    info!(
                        width = applied.width,
                        height = applied.height,
                        fourcc = ?applied.fourcc,
                        "Set V4L2 format"
                    );
                    let format = CameraFormat {
                        width: applied.width,
                        height: applied.height,
                        pixel_format: candidate,
                    };
                    return Ok((format, applied.stride));
                }
                Ok(applied) => {
                    debug!(wanted = ?candidate, got = ?applied.fourcc, "Driver substituted format");
                }
                Err(e) => {
                    debug!(wanted = ?candidate, error = %e, "Driver rejected format");
                }
            }
        }

        Err(BackendError::FormatNotSupported(format!(
            "{} offers none of {:?}",
            self.device_path,
            self.candidates()
        )))
    }
}

impl CameraBackend for V4l2Backend {
    fn open(&mut self) -> BackendResult<CameraFormat> {
        if let Some(open) = &self.open {
            return Ok(open.format);
        }

        info!(device = %self.device_path, "Opening V4L2 device");
        let dev = Device::with_path(&self.device_path)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", self.device_path, e)))?;

        let (format, stride) = self.negotiate(&dev)?;

        let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to create buffer stream: {}", e)))?;
        stream.set_timeout(timing::FRAME_POLL_INTERVAL);

        info!(device = %self.device_path, format = %format, "V4L2 capture stream started");

        self.open = Some(OpenDevice {
            stream,
            format,
            stride,
            _device: dev,
        });
        Ok(format)
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            info!(device = %self.device_path, "V4L2 device closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn next_frame(&mut self) -> BackendResult<Option<RawFrame>> {
        let rotation = self.rotation;
        let open = self.open.as_mut().ok_or(BackendError::NotInitialized)?;
        let format = open.format;
        let stride = open.stride;

        match open.stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                if meta.sequence % timing::FRAME_LOG_INTERVAL as u32 == 0 {
                    debug!(sequence = meta.sequence, size = used, "V4L2 frame captured");
                }

                Ok(Some(RawFrame {
                    width: format.width,
                    height: format.height,
                    stride: if format.pixel_format == PixelFormat::MJPEG { 0 } else { stride },
                    format: format.pixel_format,
                    rotation,
                    data: Arc::from(&buf[..used]),
                    captured_at: Instant::now(),
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) if e.raw_os_error() == Some(ENODEV) => {
                Err(BackendError::Disconnected(format!("{}: {}", self.device_path, e)))
            }
            Err(e) => Err(BackendError::IoError(e.to_string())),
        }
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn describe(&self) -> String {
        match &self.open {
            Some(open) => format!("V4L2 {} ({})", self.device_path, open.format),
            None => format!("V4L2 {}", self.device_path),
        }
    }
}
