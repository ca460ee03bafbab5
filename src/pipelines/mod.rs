// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for still capture and live scanning
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Still │ ──▶ │  Photo Pipeline   │ ──▶ │ JPEG/PNG File│
//! │              │     │  - to RGB         │     │  (fsynced)   │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Live Frames  │ ──▶ │  Scan Pipeline    │ ──▶ │  Callbacks   │
//! │              │     │  - latest-only    │     │  (4 slots)   │
//! │              │     │  - QR / OCR       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`photo`]: Still encoding and durable storage
//! - [`scan`]: Barcode analysis, capture with text recognition, callback dispatch

pub mod photo;
pub mod scan;
