// SPDX-License-Identifier: GPL-3.0-only

//! Async photo encoding pipeline
//!
//! This module handles encoding captured stills:
//! - JPEG (with quality control, MJPEG stills pass through untouched)
//! - PNG (lossless)
//!
//! All encoding and disk operations run on blocking workers.

use crate::backends::camera::format_converters::{PixelView, to_rgb};
use crate::backends::camera::types::{PixelFormat, RawFrame};
use crate::config::PhotoOutputFormat;
use crate::errors::CaptureError;
use image::RgbImage;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collisions tolerated before giving up on a unique file name
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    #[default]
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }
}

impl From<PhotoOutputFormat> for EncodingFormat {
    fn from(format: PhotoOutputFormat) -> Self {
        match format {
            PhotoOutputFormat::Jpeg => EncodingFormat::Jpeg,
            PhotoOutputFormat::Png => EncodingFormat::Png,
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    quality: EncodingQuality,
}

impl PhotoEncoder {
    /// Create a new encoder with JPEG format and high quality
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            quality: EncodingQuality::High,
        }
    }

    /// Set encoding format
    pub fn set_format(&mut self, format: EncodingFormat) {
        self.format = format;
    }

    /// Set encoding quality (only affects JPEG)
    pub fn set_quality(&mut self, quality: EncodingQuality) {
        self.quality = quality;
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    /// Encode a captured frame on a blocking worker
    pub async fn encode(&self, frame: RawFrame) -> Result<EncodedImage, CaptureError> {
        info!(
            width = frame.width,
            height = frame.height,
            source = ?frame.format,
            format = ?self.format,
            "Starting encoding"
        );

        let format = self.format;
        let quality = self.quality;

        tokio::task::spawn_blocking(move || {
            // The camera already produced a JPEG bitstream
            if frame.format == PixelFormat::MJPEG && format == EncodingFormat::Jpeg {
                debug!(size = frame.data.len(), "Passing MJPEG still through");
                return Ok(EncodedImage {
                    data: frame.data.to_vec(),
                    format,
                    width: frame.width,
                    height: frame.height,
                });
            }

            let image = to_rgb(PixelView {
                data: &frame.data,
                width: frame.width,
                height: frame.height,
                stride: frame.stride,
                format: frame.format,
            })
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;

            let (width, height) = image.dimensions();
            let data = match format {
                EncodingFormat::Jpeg => Self::encode_jpeg(image, quality)?,
                EncodingFormat::Png => Self::encode_png(image)?,
            };

            debug!(size = data.len(), "Encoding complete");

            Ok(EncodedImage {
                data,
                format,
                width,
                height,
            })
        })
        .await
        .map_err(|e| CaptureError::Encoding(format!("Encoding task error: {}", e)))?
    }

    /// Save encoded image to disk under a unique capture-time name
    ///
    /// The file is named `<millis>.<ext>`; if that name is taken the
    /// millisecond value is advanced until a free name is found. The data is
    /// flushed to stable storage before this returns.
    pub async fn save(
        &self,
        encoded: EncodedImage,
        output_dir: PathBuf,
        timestamp_millis: i64,
    ) -> Result<PathBuf, CaptureError> {
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&output_dir)?;

            for offset in 0..MAX_NAME_ATTEMPTS {
                let filepath = output_dir.join(capture_file_name(
                    timestamp_millis + offset,
                    encoded.format,
                ));
                match write_new_file(&filepath, &encoded.data) {
                    Ok(()) => {
                        info!(path = %filepath.display(), "Photo saved successfully");
                        return Ok(filepath);
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        debug!(path = %filepath.display(), "Capture name taken, advancing");
                    }
                    Err(e) => return Err(CaptureError::Storage(e.to_string())),
                }
            }

            Err(CaptureError::Storage(format!(
                "No free file name in {}",
                output_dir.display()
            )))
        })
        .await
        .map_err(|e| CaptureError::Storage(format!("Save task error: {}", e)))?
    }

    /// Encode image as JPEG
    fn encode_jpeg(image: RgbImage, quality: EncodingQuality) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CaptureError::Encoding(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Encode image as PNG
    fn encode_png(image: RgbImage) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();

        image
            .write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageFormat::Png,
            )
            .map_err(|e| CaptureError::Encoding(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// File name for a capture taken at `millis` since the Unix epoch
pub fn capture_file_name(millis: i64, format: EncodingFormat) -> String {
    format!("{}.{}", millis, format.extension())
}

fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
