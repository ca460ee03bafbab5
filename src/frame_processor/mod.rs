// SPDX-License-Identifier: MPL-2.0

//! Frame analysis
//!
//! Live frames are scanned for barcodes; stored stills are run through text
//! recognition. Both paths are asynchronous and own their input while they
//! work on it.

pub mod tasks;
pub mod types;

pub use tasks::{
    BarcodeAnalyzer, BarcodeScanner, QrDetector, RecognizedText, TesseractRecognizer,
    TextRecognizer,
};
pub use types::{BarcodeDetection, BarcodeKind, BarcodePayload, FrameRegion, WifiSecurity};
