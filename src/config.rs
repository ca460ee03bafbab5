// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::backends::shutter::ShutterSound;
use crate::constants::{app_info, barcode, ocr};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Photo output format preference
#[derive(Debug, Clone, Copy, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PhotoOutputFormat {
    /// JPEG format (lossy compression, smaller files)
    #[default]
    Jpeg,
    /// PNG format (lossless compression, larger files)
    Png,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or image files)
    pub backend: CameraBackendType,
    /// V4L2 device node
    pub device_path: String,
    /// Pixel format tried first when opening the device (e.g., "YUYV", "MJPG")
    pub preferred_format: Option<String>,
    /// Where captured stills are written; defaults to the data directory
    pub output_dir: Option<PathBuf>,
    /// Encoding of captured stills
    pub photo_format: PhotoOutputFormat,
    /// Tesseract executable
    pub tesseract_path: String,
    /// Tesseract language list (e.g., "kor+eng")
    pub ocr_languages: String,
    /// Seconds before a recognition run is abandoned
    pub ocr_timeout_secs: u64,
    /// Longest frame side handed to the QR scanner
    pub qr_max_dimension: u32,
    /// Sound played before each still capture
    pub shutter_sound: ShutterSound,
    /// Message delivered when a barcode cannot be decoded
    pub barcode_failure_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            device_path: "/dev/video0".to_string(),
            preferred_format: None,
            output_dir: None,
            photo_format: PhotoOutputFormat::default(),
            tesseract_path: ocr::DEFAULT_TESSERACT.to_string(),
            ocr_languages: ocr::DEFAULT_LANGUAGES.to_string(),
            ocr_timeout_secs: ocr::DEFAULT_TIMEOUT_SECS,
            qr_max_dimension: barcode::DEFAULT_MAX_DIMENSION,
            shutter_sound: ShutterSound::default(),
            barcode_failure_message: barcode::DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl Config {
    /// Location of the config file, `<config_dir>/card-scanner/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR).join("config.json"))
    }

    /// Load the user's config, falling back to defaults
    ///
    /// A missing file is normal. An unreadable or malformed one is logged.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                Self::default()
            }
        }
    }

    /// Load a config file, failing on unreadable or malformed content
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Directory captured stills are written to
    pub fn captures_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(app_info::APP_DIR)
            .join("captures")
    }

    /// Recognition timeout as a duration
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs.max(1))
    }
}
