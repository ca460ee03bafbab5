// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Converts frames to luminance, downscales them for speed and runs the
//! rqrr grid detector and decoder over the result.

use super::BarcodeScanner;
use crate::backends::camera::format_converters::{PixelView, to_luma};
use crate::backends::camera::types::Frame;
use crate::constants::barcode;
use crate::errors::DecodeError;
use crate::frame_processor::types::{BarcodeDetection, FrameRegion};
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::{debug, trace};

/// QR code detector
///
/// Analyzes camera frames to detect and decode QR codes.
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    /// Create a new QR detector with default settings
    pub fn new() -> Self {
        Self::with_max_dimension(barcode::DEFAULT_MAX_DIMENSION)
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(64),
        }
    }

    /// Detect and decode every QR code in a luminance image
    pub fn scan_luma(&self, luma: &GrayImage) -> Result<Vec<BarcodeDetection>, DecodeError> {
        let start = std::time::Instant::now();
        let (width, height) = luma.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::UnsupportedFrame("empty frame".to_string()));
        }

        let scale = (width as f32 / self.max_dimension as f32)
            .max(height as f32 / self.max_dimension as f32)
            .max(1.0);
        let resized;
        let image = if scale > 1.0 {
            let new_width = ((width as f32 / scale) as u32).max(1);
            let new_height = ((height as f32 / scale) as u32).max(1);
            resized = imageops::resize(luma, new_width, new_height, FilterType::Triangle);
            &resized
        } else {
            luma
        };

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();

        trace!(
            proc_width = image.width(),
            proc_height = image.height(),
            scale,
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        if grids.is_empty() {
            return Ok(Vec::new());
        }

        let mut detections = Vec::with_capacity(grids.len());
        let mut last_error = None;

        for grid in &grids {
            let content = match grid.decode() {
                Ok((_meta, content)) => content,
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR code");
                    last_error = Some(format!("{:?}", e));
                    continue;
                }
            };

            let xs = grid.bounds.iter().map(|p| p.x.max(0) as f32 * scale);
            let ys = grid.bounds.iter().map(|p| p.y.max(0) as f32 * scale);
            let min_x = xs.clone().fold(f32::MAX, f32::min);
            let max_x = xs.fold(0.0, f32::max);
            let min_y = ys.clone().fold(f32::MAX, f32::min);
            let max_y = ys.fold(0.0, f32::max);

            let region = FrameRegion::from_pixels(
                min_x as u32,
                min_y as u32,
                (max_x - min_x) as u32,
                (max_y - min_y) as u32,
                width,
                height,
            );

            debug!(
                content = %content,
                x = region.x,
                y = region.y,
                "Detected QR code"
            );

            detections.push(BarcodeDetection::new(region, content));
        }

        if detections.is_empty() {
            return Err(DecodeError::Undecodable(
                last_error.unwrap_or_else(|| "no symbol decoded".to_string()),
            ));
        }

        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
        Ok(detections)
    }
}

impl BarcodeScanner for QrDetector {
    fn scan(&self, frame: &Frame) -> Result<Vec<BarcodeDetection>, DecodeError> {
        let luma = to_luma(PixelView {
            data: &frame.data,
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
            format: frame.format,
        })
        .map_err(|e| DecodeError::UnsupportedFrame(e.to_string()))?;

        self.scan_luma(&luma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{PixelFormat, RawFrame};

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = Frame::detached(RawFrame::rgba(32, 32, vec![255; 32 * 32 * 4]), 1);
        let detections = QrDetector::new().scan(&frame).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_large_frame_is_downscaled() {
        let luma = GrayImage::from_pixel(2000, 1000, image::Luma([255]));
        let detections = QrDetector::with_max_dimension(320).scan_luma(&luma).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_truncated_frame_is_unsupported() {
        let raw = RawFrame {
            format: PixelFormat::Gray8,
            stride: 8,
            ..RawFrame::rgba(8, 8, vec![0; 10])
        };
        let result = QrDetector::new().scan(&Frame::detached(raw, 1));
        assert!(matches!(result, Err(DecodeError::UnsupportedFrame(_))));
    }
}
