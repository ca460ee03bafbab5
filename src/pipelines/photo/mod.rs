// SPDX-License-Identifier: MPL-2.0

//! Still capture persistence
//!
//! ```text
//! Camera still → Encoding → Disk I/O (fsync) → StoredImage
//! ```
//!
//! Every stage runs off the async executor so the live feed keeps flowing
//! while a still is written.

pub mod encoding;

pub use encoding::{EncodingFormat, EncodingQuality, PhotoEncoder};

use crate::backends::camera::types::RawFrame;
use crate::errors::CaptureError;
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// One-shot request to persist a still image
///
/// The request is consumed when it resolves, so it resolves exactly once.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    output_dir: PathBuf,
    format: EncodingFormat,
    requested_at: DateTime<Local>,
}

impl CaptureRequest {
    /// Request a capture into `output_dir`, timestamped now
    pub fn new(output_dir: impl Into<PathBuf>, format: EncodingFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            requested_at: Local::now(),
        }
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn requested_at(&self) -> DateTime<Local> {
        self.requested_at
    }

    /// File name this request prefers, before collision handling
    pub fn preferred_file_name(&self) -> String {
        encoding::capture_file_name(self.requested_at.timestamp_millis(), self.format)
    }
}

/// Handle to a still image that has been durably written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: EncodingFormat,
    pub captured_at: DateTime<Local>,
}

/// Encode → save workflow for captured stills
#[derive(Debug, Clone, Default)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(encoder: PhotoEncoder) -> Self {
        Self { encoder }
    }

    /// Encode `frame` and write it as `request` asks
    pub async fn store(
        &self,
        frame: RawFrame,
        request: CaptureRequest,
    ) -> Result<StoredImage, CaptureError> {
        let mut encoder = self.encoder.clone();
        encoder.set_format(request.format);

        let encoded = encoder.encode(frame).await?;
        let (width, height, format) = (encoded.width, encoded.height, encoded.format);
        let path = encoder
            .save(
                encoded,
                request.output_dir.clone(),
                request.requested_at.timestamp_millis(),
            )
            .await?;

        Ok(StoredImage {
            path,
            width,
            height,
            format,
            captured_at: request.requested_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_name_is_capture_millis() {
        let request = CaptureRequest::new("/tmp", EncodingFormat::Png);
        let expected = format!("{}.png", request.requested_at().timestamp_millis());
        assert_eq!(request.preferred_file_name(), expected);
    }

    #[tokio::test]
    async fn test_store_writes_file_with_dimensions() {
        let dir = std::env::temp_dir().join(format!("card-scanner-store-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let request = CaptureRequest::new(&dir, EncodingFormat::Png);
        let preferred = request.preferred_file_name();

        let stored = PhotoPipeline::default()
            .store(RawFrame::rgba(3, 2, vec![128; 24]), request)
            .await
            .unwrap();

        assert_eq!((stored.width, stored.height), (3, 2));
        assert_eq!(stored.path.file_name().unwrap().to_str().unwrap(), preferred);
        assert!(stored.path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
