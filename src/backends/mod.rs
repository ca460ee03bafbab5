// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Scan Pipeline                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Shutter   │    │     Camera       │   │
//! │  │    cue      │    │     (V4L2)       │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │                     ┌──────────────────┐   │
//! │                     │ Virtual Camera   │   │
//! │                     │  (image files)   │   │
//! │                     └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: Camera backend trait, V4L2 device access and the frame source
//! - [`shutter`]: Audible cue played before a still capture
//! - [`virtual_camera`]: Image files replayed as a live feed

pub mod camera;
pub mod shutter;
pub mod virtual_camera;
