// SPDX-License-Identifier: MPL-2.0

//! Card Scanner - camera capture and recognition for note taking
//!
//! Photographed text and scanned barcodes become plain strings that a note
//! editor can consume.
//!
//! # Architecture
//!
//! - [`backends`]: Camera backends and the frame source
//! - [`frame_processor`]: Barcode scanning, payload classification, text recognition
//! - [`pipelines`]: Still persistence and the scan pipeline
//! - [`config`]: User configuration handling
//! - [`storage`]: Captured still bookkeeping
//!
//! # Example
//!
//! ```ignore
//! let pipeline = ScanPipeline::from_config(&config, backend);
//! pipeline.set_callback(Callback::OnCaptureSuccess(Arc::new(|text| println!("{text}"))));
//! let preview = pipeline.start(&HostLifecycle::new())?;
//! pipeline.capture_still()?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use frame_processor::{BarcodeKind, BarcodePayload};
pub use pipelines::scan::{
    Callback, CallbackSet, CallbackSlot, HostLifecycle, PipelineState, RecognitionOutcome,
    ScanPipeline, ScanSettings,
};
