// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend fed from still image files
//!
//! Replays decoded images as a live feed so the scan pipeline can run
//! without camera hardware, e.g. to decode barcodes from screenshots.
//!
//! ```text
//! Image files ──decode──▶ RGBA frames ──~30fps loop──▶ FrameSource
//! ```

mod file_source;

pub use file_source::{ImageFileBackend, load_image_as_frame};
