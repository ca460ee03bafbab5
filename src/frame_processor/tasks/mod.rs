// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Barcode scanning runs continuously over live frames; text recognition
//! runs once per stored still.

pub mod barcode_analyzer;
pub mod qr_detector;
pub mod text_recognizer;

pub use barcode_analyzer::BarcodeAnalyzer;
pub use qr_detector::QrDetector;
pub use text_recognizer::{RecognizedText, TesseractRecognizer, TextRecognizer};

use crate::backends::camera::types::Frame;
use crate::errors::DecodeError;
use crate::frame_processor::types::BarcodeDetection;

/// Blocking barcode scanner over a single frame
///
/// `Ok` with an empty list means the frame simply held no symbol. An error
/// means a symbol was there but could not be read.
pub trait BarcodeScanner: Send + Sync {
    fn scan(&self, frame: &Frame) -> Result<Vec<BarcodeDetection>, DecodeError>;
}
